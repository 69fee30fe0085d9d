//! Relocation of extracted archive trees into the install layout.
//!
//! After extraction the install directory holds the archives' own root
//! directories. The binaries build-variant folder is flattened into the
//! install root, the data root becomes `data`, and a copy of the installer
//! is placed next to the game so the install can remove itself later.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::InstallConfig;

use super::error::{ManagerError, ManagerResult};
use super::fsutil::{delete_file_if_exists, move_entry};

/// Name the data root is given inside the install directory.
pub const DATA_DIR_NAME: &str = "data";

/// The installer's own files that are copied into every install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfImage {
    /// The installer executable.
    pub executable: PathBuf,
    /// The configuration file next to it, when it was loaded from disk.
    pub config_file: Option<PathBuf>,
}

impl SelfImage {
    pub fn new(executable: impl Into<PathBuf>, config_file: Option<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            config_file,
        }
    }

    /// The running executable and the file `config` was loaded from.
    pub fn current(config: &InstallConfig) -> ManagerResult<Self> {
        let executable = env::current_exe().map_err(|e| ManagerError::ReadFailed {
            path: PathBuf::from("<current executable>"),
            source: e,
        })?;

        Ok(Self::new(executable, config.source_file().map(Path::to_path_buf)))
    }

    /// File name of the executable inside an install.
    pub fn executable_name(&self) -> PathBuf {
        self.executable
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("zetasetup{}", env::consts::EXE_SUFFIX)))
    }

    /// Path the executable has once copied into `install_dir`.
    pub fn installed_executable(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(self.executable_name())
    }
}

/// Name the binaries root is renamed to before it is flattened.
///
/// Staging keeps files named like the root from colliding with it. The
/// directory is removed with the other temporary files after the run.
pub const BINARIES_STAGING_DIR: &str = ".zetasetup-binaries";

/// Directory whose files are moved up into the install root, below the
/// staged binaries root.
pub fn binaries_source_dir(staging: &Path, variant: Option<&str>) -> PathBuf {
    match variant {
        Some(variant) => staging.join(variant),
        None => staging.to_path_buf(),
    }
}

/// Flatten the build-variant folder into the install root.
///
/// Every file below the variant folder, at any depth, is moved to
/// `install_dir/<file name>`; whatever already has that name is replaced.
/// Files sharing a name are moved in path order, so the last one wins.
/// The remains of the binaries root are left in [`BINARIES_STAGING_DIR`].
///
/// Returns the number of files moved.
pub fn normalize_binaries(
    install_dir: &Path,
    binaries_root: &str,
    variant: Option<&str>,
) -> ManagerResult<usize> {
    let root = install_dir.join(binaries_root);
    let staging = install_dir.join(BINARIES_STAGING_DIR);

    if !root.is_dir() {
        return Err(ManagerError::LayoutMissing { path: root });
    }
    move_entry(&root, &staging)?;

    let source_dir = binaries_source_dir(&staging, variant);
    if !source_dir.is_dir() {
        return Err(ManagerError::LayoutMissing {
            path: binaries_source_dir(&root, variant),
        });
    }

    let mut files = list_files(&source_dir)?;
    files.sort();

    for file in &files {
        let Some(name) = file.file_name() else {
            continue;
        };
        if name == BINARIES_STAGING_DIR {
            return Err(ManagerError::ExtractionFailed {
                path: file.clone(),
                reason: format!("{} is a reserved name", BINARIES_STAGING_DIR),
            });
        }
        move_entry(file, &install_dir.join(name))?;
    }

    debug!(
        source = %source_dir.display(),
        dest = %install_dir.display(),
        moved = files.len(),
        "Binaries normalized"
    );

    Ok(files.len())
}

/// Every non-directory entry below `dir`. Symlinks are listed, not followed.
fn list_files(dir: &Path) -> ManagerResult<Vec<PathBuf>> {
    let read_failed = |e: std::io::Error| ManagerError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;
        let file_type = entry.file_type().map_err(read_failed)?;
        if file_type.is_dir() {
            files.extend(list_files(&entry.path())?);
        } else {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Copy the installer executable and its configuration into `install_dir`.
///
/// Skips files that already are the destination (an installed copy
/// re-running itself).
pub fn copy_self_image(install_dir: &Path, image: &SelfImage) -> ManagerResult<()> {
    let files = std::iter::once(&image.executable).chain(image.config_file.as_ref());

    for source in files {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = install_dir.join(name);

        if same_file(source, &dest) {
            continue;
        }

        delete_file_if_exists(&dest)?;
        fs::copy(source, &dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.clone(),
            source: e,
        })?;
    }

    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Rename the data archive's root to `data`.
///
/// Nothing is renamed when the root already is `data`, ignoring ASCII case.
/// An existing `data` directory is replaced.
pub fn normalize_data(install_dir: &Path, data_root: &str) -> ManagerResult<PathBuf> {
    let source = install_dir.join(data_root);
    if !source.is_dir() {
        return Err(ManagerError::LayoutMissing { path: source });
    }

    if data_root.eq_ignore_ascii_case(DATA_DIR_NAME) {
        return Ok(source);
    }

    let dest = install_dir.join(DATA_DIR_NAME);
    move_entry(&source, &dest)?;
    debug!(from = %source.display(), to = %dest.display(), "Data root renamed");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.file_name().unwrap().to_string_lossy().as_bytes()).unwrap();
    }

    #[test]
    fn test_normalize_binaries_flattens_variant_tree() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("zetaglest-0.8.1/vs2017/zetaglest-64"));
        touch(&install.join("zetaglest-0.8.1/vs2017/lib/libfoo.so"));
        touch(&install.join("zetaglest-0.8.1/vs2017/lib/plugins/x.dll"));
        touch(&install.join("zetaglest-0.8.1/README"));

        let moved = normalize_binaries(install, "zetaglest-0.8.1", Some("vs2017")).unwrap();

        assert_eq!(moved, 3);
        assert!(install.join("zetaglest-64").is_file());
        assert!(install.join("libfoo.so").is_file());
        assert!(install.join("x.dll").is_file());
        assert!(!install.join("lib").exists());
        assert!(!install.join("zetaglest-0.8.1").exists());
        // Entries outside the variant folder are left for cleanup.
        assert!(install.join(BINARIES_STAGING_DIR).join("README").exists());
    }

    #[test]
    fn test_normalize_binaries_replaces_collisions() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("bin-root/vs2017/lib/libzg.so"));
        fs::write(install.join("libzg.so"), b"stale").unwrap();
        // A directory in the way of a file is replaced too.
        touch(&install.join("zetaglest-64/old"));
        touch(&install.join("bin-root/vs2017/zetaglest-64"));

        normalize_binaries(install, "bin-root", Some("vs2017")).unwrap();

        assert_eq!(fs::read(install.join("libzg.so")).unwrap(), b"libzg.so");
        assert!(install.join("zetaglest-64").is_file());
    }

    #[test]
    fn test_normalize_binaries_duplicate_names_last_wins() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("bin-root/a/readme.txt"));
        let second = install.join("bin-root/b/readme.txt");
        fs::create_dir_all(second.parent().unwrap()).unwrap();
        fs::write(&second, b"second").unwrap();

        let moved = normalize_binaries(install, "bin-root", None).unwrap();

        assert_eq!(moved, 2);
        assert_eq!(fs::read(install.join("readme.txt")).unwrap(), b"second");
    }

    #[test]
    fn test_normalize_binaries_without_variant() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("bin-root/zetaglest-64"));

        normalize_binaries(install, "bin-root", None).unwrap();
        assert!(install.join("zetaglest-64").exists());
    }

    #[test]
    fn test_normalize_binaries_file_named_like_root() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("zetaglest/zetaglest"));
        touch(&install.join("zetaglest/zetaglest.ini"));

        let moved = normalize_binaries(install, "zetaglest", None).unwrap();
        fs::remove_dir_all(install.join(BINARIES_STAGING_DIR)).unwrap();

        assert_eq!(moved, 2);
        assert!(install.join("zetaglest").is_file());
        assert!(install.join("zetaglest.ini").is_file());
    }

    #[test]
    fn test_normalize_binaries_missing_variant() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("bin-root")).unwrap();

        let result = normalize_binaries(temp.path(), "bin-root", Some("vs2017"));
        match result {
            Err(ManagerError::LayoutMissing { path }) => {
                assert_eq!(path, temp.path().join("bin-root/vs2017"));
            }
            other => panic!("expected LayoutMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_binaries_missing_root() {
        let temp = TempDir::new().unwrap();

        let result = normalize_binaries(temp.path(), "bin-root", None);
        assert!(matches!(result, Err(ManagerError::LayoutMissing { .. })));
    }

    #[test]
    fn test_normalize_data_renames_root() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("zetaglest-data/maps/island.mgm"));
        touch(&install.join("data/old.txt"));

        let data = normalize_data(install, "zetaglest-data").unwrap();

        assert_eq!(data, install.join("data"));
        assert!(install.join("data/maps/island.mgm").exists());
        assert!(!install.join("data/old.txt").exists());
        assert!(!install.join("zetaglest-data").exists());
    }

    #[test]
    fn test_normalize_data_same_name_ignoring_case() {
        let temp = TempDir::new().unwrap();
        let install = temp.path();
        touch(&install.join("Data/maps/island.mgm"));

        let data = normalize_data(install, "Data").unwrap();

        assert_eq!(data, install.join("Data"));
        assert!(install.join("Data/maps/island.mgm").exists());
    }

    #[test]
    fn test_copy_self_image() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("dist/zetasetup");
        let ini = temp.path().join("dist/zetasetup.ini");
        touch(&exe);
        touch(&ini);
        let install = temp.path().join("install");
        fs::create_dir(&install).unwrap();

        let image = SelfImage::new(&exe, Some(ini));
        copy_self_image(&install, &image).unwrap();

        assert!(install.join("zetasetup").is_file());
        assert!(install.join("zetasetup.ini").is_file());
        assert_eq!(image.installed_executable(&install), install.join("zetasetup"));

        // Running from the installed copy leaves the files untouched.
        let installed = SelfImage::new(install.join("zetasetup"), Some(install.join("zetasetup.ini")));
        copy_self_image(&install, &installed).unwrap();
        assert!(install.join("zetasetup").is_file());
    }
}

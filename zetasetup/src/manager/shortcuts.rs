//! Launcher shortcuts as freedesktop `.desktop` entries.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::InstallerPaths;

use super::error::{ManagerError, ManagerResult};
use super::traits::ShortcutManager;

/// Pointer width of the installed build, part of the executable names.
pub const BITNESS: u32 = if cfg!(target_pointer_width = "64") { 64 } else { 32 };

/// File name of the desktop entry for the game.
const DESKTOP_ENTRY_NAME: &str = "zetaglest.desktop";

struct Launcher {
    file_name: &'static str,
    name: &'static str,
    comment: &'static str,
    executable: String,
    args: &'static str,
}

/// Executable name of a game tool for the current platform.
pub fn tool_executable(tool: &str) -> String {
    format!("{}-{}{}", tool, BITNESS, std::env::consts::EXE_SUFFIX)
}

/// Writes `.desktop` entries to a menu folder and the desktop.
#[derive(Debug, Clone)]
pub struct DesktopEntryShortcuts {
    menu_dir: PathBuf,
    desktop_dir: PathBuf,
    uninstaller_name: PathBuf,
}

impl DesktopEntryShortcuts {
    /// `uninstaller_name` is the installer's file name inside an install.
    pub fn new(
        menu_dir: impl Into<PathBuf>,
        desktop_dir: impl Into<PathBuf>,
        uninstaller_name: impl Into<PathBuf>,
    ) -> Self {
        Self {
            menu_dir: menu_dir.into(),
            desktop_dir: desktop_dir.into(),
            uninstaller_name: uninstaller_name.into(),
        }
    }

    pub fn from_paths(paths: &InstallerPaths, uninstaller_name: impl Into<PathBuf>) -> Self {
        Self::new(paths.menu_dir(), paths.desktop_dir(), uninstaller_name)
    }

    fn game_launcher() -> Launcher {
        Launcher {
            file_name: DESKTOP_ENTRY_NAME,
            name: "ZetaGlest",
            comment: "ZetaGlest 3D RTS Game",
            executable: tool_executable("zetaglest"),
            args: "",
        }
    }

    fn menu_launchers(&self) -> Vec<Launcher> {
        vec![
            Self::game_launcher(),
            Launcher {
                file_name: "zetaglest-map-editor.desktop",
                name: "Map Editor",
                comment: "Map Editor for ZetaGlest 3D RTS Game",
                executable: tool_executable("map_editor"),
                args: "",
            },
            Launcher {
                file_name: "zetaglest-g3d-viewer.desktop",
                name: "G3D Viewer",
                comment: "Model Viewer for ZetaGlest 3D RTS Game",
                executable: tool_executable("g3d_viewer"),
                args: "",
            },
            Launcher {
                file_name: "zetaglest-uninstall.desktop",
                name: "Uninstall ZetaGlest",
                comment: "Uninstalls ZetaGlest 3D RTS Game",
                executable: self.uninstaller_name.to_string_lossy().into_owned(),
                args: " uninstall",
            },
        ]
    }

    fn write_entry(dir: &Path, install_dir: &Path, launcher: &Launcher) -> ManagerResult<PathBuf> {
        let path = dir.join(launcher.file_name);
        fs::write(&path, render_entry(install_dir, launcher)).map_err(|e| ManagerError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(|e| {
                ManagerError::WriteFailed {
                    path: path.clone(),
                    source: e,
                }
            })?;
        }

        debug!(shortcut = %path.display(), "Shortcut written");
        Ok(path)
    }
}

fn render_entry(install_dir: &Path, launcher: &Launcher) -> String {
    let executable = install_dir.join(&launcher.executable);
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={}\n\
         Comment={}\n\
         Exec=\"{}\"{}\n\
         Path={}\n\
         Terminal=false\n\
         Categories=Game;StrategyGame;\n",
        launcher.name,
        launcher.comment,
        executable.display(),
        launcher.args,
        install_dir.display()
    )
}

impl ShortcutManager for DesktopEntryShortcuts {
    fn create_menu_entries(&self, install_dir: &Path) -> ManagerResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.menu_dir).map_err(|e| ManagerError::CreateDirFailed {
            path: self.menu_dir.clone(),
            source: e,
        })?;

        self.menu_launchers()
            .iter()
            .map(|launcher| Self::write_entry(&self.menu_dir, install_dir, launcher))
            .collect()
    }

    fn create_desktop_entry(&self, install_dir: &Path) -> ManagerResult<PathBuf> {
        fs::create_dir_all(&self.desktop_dir).map_err(|e| ManagerError::CreateDirFailed {
            path: self.desktop_dir.clone(),
            source: e,
        })?;

        Self::write_entry(&self.desktop_dir, install_dir, &Self::game_launcher())
    }

    fn known_locations(&self) -> Vec<PathBuf> {
        vec![
            self.menu_dir.clone(),
            self.desktop_dir.join(DESKTOP_ENTRY_NAME),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shortcuts(temp: &TempDir) -> DesktopEntryShortcuts {
        DesktopEntryShortcuts::new(
            temp.path().join("applications/ZetaGlest"),
            temp.path().join("Desktop"),
            "zetasetup",
        )
    }

    #[test]
    fn test_tool_executable_names() {
        let name = tool_executable("map_editor");
        assert!(name.starts_with(&format!("map_editor-{}", BITNESS)));
    }

    #[test]
    fn test_menu_entries() {
        let temp = TempDir::new().unwrap();
        let shortcuts = shortcuts(&temp);
        let install = Path::new("/opt/ZetaGlest");

        let created = shortcuts.create_menu_entries(install).unwrap();
        assert_eq!(created.len(), 4);

        let game = fs::read_to_string(&created[0]).unwrap();
        assert!(game.contains("Name=ZetaGlest\n"));
        assert!(game.contains(&format!("/opt/ZetaGlest/{}", tool_executable("zetaglest"))));
        assert!(game.contains("Path=/opt/ZetaGlest\n"));

        let uninstall = fs::read_to_string(&created[3]).unwrap();
        assert!(uninstall.contains("Exec=\"/opt/ZetaGlest/zetasetup\" uninstall\n"));
    }

    #[test]
    fn test_desktop_entry_and_known_locations() {
        let temp = TempDir::new().unwrap();
        let shortcuts = shortcuts(&temp);

        let entry = shortcuts.create_desktop_entry(Path::new("/opt/ZetaGlest")).unwrap();
        assert_eq!(entry, temp.path().join("Desktop/zetaglest.desktop"));

        let locations = shortcuts.known_locations();
        assert!(locations.contains(&entry));
        assert!(locations.contains(&temp.path().join("applications/ZetaGlest")));
    }
}

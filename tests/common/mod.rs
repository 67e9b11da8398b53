#![allow(dead_code)]

use magicrepos::Repository;
use magicrepos::oracles::{ControlDirIgnore, StaticIdentity};
use std::path::Path;

/// Initialize a repository with a fixed test identity
pub fn init_repo(workdir: &Path) -> Repository {
    Repository::init_with(
        workdir,
        Box::new(ControlDirIgnore),
        Box::new(StaticIdentity::named("Test User", "test@example.com")),
    )
    .expect("repository init")
}

pub fn write_file(workdir: &Path, relative: &str, content: &str) {
    let path = workdir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, content).expect("write file");
}

pub fn read_file(workdir: &Path, relative: &str) -> String {
    std::fs::read_to_string(workdir.join(relative)).expect("read file")
}

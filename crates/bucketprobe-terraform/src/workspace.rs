//! Private copies of module directories.
//!
//! Terraform keeps state next to the module. Every scenario applies a fresh
//! copy in its own temp dir, so parallel scenarios never share state.
//!
//! Modules usually reach the rest of the repository through relative
//! sources (`source = "../.."`), so the whole repository root is copied and
//! terraform runs in the module's sub-directory of the copy.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bucketprobe_core::ProbeResult;
use serde::Serialize;
use tempfile::TempDir;
use tracing::debug;

/// Name of the variables file terraform loads automatically.
pub const VARS_FILE: &str = "terraform.tfvars.json";

/// A repository copied into a temp dir, removed on drop.
#[derive(Debug)]
pub struct ModuleWorkspace {
    dir: TempDir,
    module: PathBuf,
}

impl ModuleWorkspace {
    /// Copy the repository holding `module` into a new temp dir.
    ///
    /// `root` is the tree to copy. When unset, it is the closest ancestor of
    /// `module` containing `.git`, or `module` itself if there is none.
    /// `module` must lie inside `root`.
    pub async fn copy_from(root: Option<&Path>, module: &Path, label: &str) -> ProbeResult<Self> {
        let root = root.map(Path::to_path_buf);
        let module = module.to_path_buf();
        let prefix = format!("bucketprobe-{label}-");
        let task = move || copy_repository(root.as_deref(), &module, &prefix);
        let (dir, relative) = tokio::task::spawn_blocking(task)
            .await
            .map_err(io::Error::other)??;
        let module = dir.path().join(relative);
        debug!(path = %module.display(), "module copied");
        Ok(Self { dir, module })
    }

    /// Directory terraform runs in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.module
    }

    /// Root of the copied tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `vars` as [`VARS_FILE`] into the module directory.
    pub async fn write_vars<T: Serialize>(&self, vars: &T) -> ProbeResult<PathBuf> {
        let path = self.module.join(VARS_FILE);
        let json = serde_json::to_vec_pretty(vars)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Copy the tree holding `module` and return it with the module's relative path.
fn copy_repository(
    root: Option<&Path>,
    module: &Path,
    prefix: &str,
) -> io::Result<(TempDir, PathBuf)> {
    let module = module.canonicalize()?;
    let root = match root {
        Some(root) => root.canonicalize()?,
        None => repository_root(&module),
    };
    let relative = module
        .strip_prefix(&root)
        .map_err(|_| outside_root(&module, &root))?
        .to_path_buf();
    let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
    copy_tree(&root, dir.path())?;
    Ok((dir, relative))
}

fn outside_root(module: &Path, root: &Path) -> io::Error {
    let (module, root) = (module.display(), root.display());
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("module {module} is outside root {root}"),
    )
}

/// Closest ancestor of `module` (itself included) holding a `.git` entry.
fn repository_root(module: &Path) -> PathBuf {
    module
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .unwrap_or(module)
        .to_path_buf()
}

/// Whether an entry is left out of the copy.
fn skipped(name: &str) -> bool {
    name.starts_with('.')
        || name.ends_with(".tfstate")
        || name.ends_with(".tfstate.backup")
        || name == VARS_FILE
}

/// Recursively copy a tree, leaving out provider caches, state and hidden files.
fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name();
        if skipped(&name.to_string_lossy()) {
            continue;
        }
        let from = entry.path();
        let to = target.join(&name);
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&to)?;
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("main.tf"), "resource \"x\" \"y\" {}").unwrap();
        fs::write(root.join("terraform.tfstate"), "{}").unwrap();
        fs::write(root.join("terraform.tfstate.backup"), "{}").unwrap();
        fs::write(root.join(".terraform.lock.hcl"), "").unwrap();
        fs::create_dir_all(root.join(".terraform/providers")).unwrap();
        fs::write(root.join(".terraform/providers/aws"), "binary").unwrap();
        fs::create_dir_all(root.join("modules/policy")).unwrap();
        fs::write(root.join("modules/policy/main.tf"), "").unwrap();
        dir
    }

    /// A repository whose example module calls the root module as `../..`.
    fn repository_fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::write(root.join("main.tf"), "resource \"aws_s3_bucket\" \"this\" {}").unwrap();
        fs::create_dir_all(root.join("examples/test_minimal")).unwrap();
        fs::write(
            root.join("examples/test_minimal/main.tf"),
            "module \"s3\" {\n  source = \"../..\"\n}\n",
        )
        .unwrap();
        fs::write(root.join("examples/test_minimal/terraform.tfstate"), "{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_should_copy_module_without_state() {
        let source = module_fixture();

        let ws = ModuleWorkspace::copy_from(None, source.path(), "bucket")
            .await
            .unwrap();

        assert!(ws.path().join("main.tf").exists());
        assert!(ws.path().join("modules/policy/main.tf").exists());
        assert!(!ws.path().join("terraform.tfstate").exists());
        assert!(!ws.path().join("terraform.tfstate.backup").exists());
        assert!(!ws.path().join(".terraform").exists());
        assert!(!ws.path().join(".terraform.lock.hcl").exists());
    }

    #[tokio::test]
    async fn test_should_resolve_relative_module_source_inside_copy() {
        let repo = repository_fixture();
        let module = repo.path().join("examples/test_minimal");

        let ws = ModuleWorkspace::copy_from(None, &module, "bucket")
            .await
            .unwrap();

        assert!(ws.path().starts_with(ws.root()));
        assert!(ws.path().ends_with("examples/test_minimal"));
        assert!(ws.path().join("main.tf").exists());
        assert!(ws.path().join("../../main.tf").exists());
        assert!(!ws.path().join("terraform.tfstate").exists());
        assert!(!ws.root().join(".git").exists());
    }

    #[tokio::test]
    async fn test_should_copy_explicit_root() {
        let repo = repository_fixture();
        let examples = repo.path().join("examples");
        let module = examples.join("test_minimal");

        let ws = ModuleWorkspace::copy_from(Some(&examples), &module, "bucket")
            .await
            .unwrap();

        assert!(ws.path().ends_with("test_minimal"));
        assert!(ws.root().join("test_minimal/main.tf").exists());
        assert!(!ws.root().join("main.tf").exists());
    }

    #[tokio::test]
    async fn test_should_reject_module_outside_root() {
        let repo = repository_fixture();
        let other = module_fixture();

        let copy = ModuleWorkspace::copy_from(Some(repo.path()), other.path(), "bucket");

        assert!(copy.await.is_err());
    }

    #[tokio::test]
    async fn test_should_give_each_copy_its_own_dir() {
        let source = module_fixture();
        let a = ModuleWorkspace::copy_from(None, source.path(), "bucket")
            .await
            .unwrap();
        let b = ModuleWorkspace::copy_from(None, source.path(), "bucket")
            .await
            .unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_should_write_vars_into_module_dir() {
        let repo = repository_fixture();
        let module = repo.path().join("examples/test_minimal");
        let ws = ModuleWorkspace::copy_from(None, &module, "role")
            .await
            .unwrap();

        let path = ws
            .write_vars(&serde_json::json!({"name_prefix": "abc"}))
            .await
            .unwrap();

        assert_eq!(path, ws.path().join(VARS_FILE));
        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(written["name_prefix"], "abc");
    }

    #[tokio::test]
    async fn test_should_fail_for_missing_module() {
        let missing = Path::new("/nonexistent/bucketprobe/module");
        assert!(
            ModuleWorkspace::copy_from(None, missing, "bucket")
                .await
                .is_err()
        );
    }
}

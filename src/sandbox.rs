//! 共享目录路径沙箱：所有按名称访问文件的操作都经由此处解析。

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// 共享目录根路径（绝对路径）及其解析规则。
#[derive(Clone, Debug)]
pub struct Sandbox {
    root: PathBuf,
}

/// 已验证位于共享目录内的绝对路径。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// 共享目录内的条目名称（用于日志）。
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxViolation;

impl fmt::Display for SandboxViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("outside sandbox")
    }
}

impl std::error::Error for SandboxViolation {}

impl Sandbox {
    /// `root` 需为规范化后的绝对路径（见 `Storage::open`）。
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 上传命名：只保留最后一个路径段后再解析。
    pub fn resolve_upload_name(&self, raw: &str) -> Result<ResolvedPath, SandboxViolation> {
        self.resolve(base_name(raw))
    }

    /// 将调用方给出的（已解码）名称拼接到根目录并做词法规范化，
    /// 结果必须严格位于根目录之下。
    pub fn resolve(&self, raw: &str) -> Result<ResolvedPath, SandboxViolation> {
        if raw.is_empty() {
            return Err(SandboxViolation);
        }
        let unified = raw.replace('\\', "/");
        let joined = self.root.join(&unified);

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::Prefix(prefix) => {
                    normalized = PathBuf::from(prefix.as_os_str());
                }
                Component::RootDir => normalized.push(component.as_os_str()),
                Component::CurDir => continue,
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::Normal(segment) => normalized.push(segment),
            }
        }

        // 等于根目录本身不是合法条目
        if normalized == self.root || !normalized.starts_with(&self.root) {
            return Err(SandboxViolation);
        }
        Ok(ResolvedPath(normalized))
    }
}

/// 去掉所有目录部分（`/` 与 `\` 都视为分隔符），返回最后一段。
pub fn base_name(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new(PathBuf::from("/srv/drop"))
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("report.pdf"), "report.pdf");
        assert_eq!(base_name("../../etc/passwd"), "passwd");
        assert_eq!(base_name("..\\..\\win.ini"), "win.ini");
        assert_eq!(base_name("C:\\Users\\me\\photo.jpg"), "photo.jpg");
        assert_eq!(base_name("dir/"), "");
    }

    #[test]
    fn resolve_accepts_plain_names() {
        let resolved = sandbox().resolve("report.pdf").expect("resolve");
        assert_eq!(resolved.as_path(), Path::new("/srv/drop/report.pdf"));
        assert_eq!(resolved.file_name(), "report.pdf");
    }

    #[test]
    fn resolve_normalizes_inner_parent_segments() {
        let resolved = sandbox().resolve("a/../b.txt").expect("resolve");
        assert_eq!(resolved.as_path(), Path::new("/srv/drop/b.txt"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let sandbox = sandbox();
        for raw in [
            "../secret",
            "/etc/passwd",
            "..\\..\\win.ini",
            "a/../../b",
            "./../drop2/x",
            "..",
            ".",
            "",
            "/",
            "//",
            "\\",
            "a/..",
        ] {
            assert_eq!(sandbox.resolve(raw), Err(SandboxViolation), "{raw:?}");
        }
    }

    #[test]
    fn resolve_rejects_sibling_with_shared_prefix() {
        assert!(sandbox().resolve("../drop-other/file").is_err());
    }

    #[test]
    fn upload_name_is_reduced_before_join() {
        let sandbox = sandbox();
        let resolved = sandbox
            .resolve_upload_name("../../etc/passwd")
            .expect("resolve");
        assert_eq!(resolved.as_path(), Path::new("/srv/drop/passwd"));
        assert!(sandbox.resolve_upload_name("../").is_err());
        assert!(sandbox.resolve_upload_name("x/..").is_err());
    }
}

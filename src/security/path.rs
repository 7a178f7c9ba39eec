use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Same bound the kernel uses before giving up with ELOOP.
const MAX_SYMLINK_HOPS: usize = 40;

enum Part {
    Root(PathBuf),
    Parent,
    Name(OsString),
}

/// Push the components of `path` onto the front of `queue`, preserving order.
fn enqueue(queue: &mut VecDeque<Part>, path: &Path) {
    let mut root = PathBuf::new();
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => parts.push(Part::Parent),
            Component::Normal(name) => parts.push(Part::Name(name.to_os_string())),
        }
    }
    for part in parts.into_iter().rev() {
        queue.push_front(part);
    }
    if !root.as_os_str().is_empty() {
        queue.push_front(Part::Root(root));
    }
}

/// Resolve `path` to an absolute path with every symlink and `..` resolved.
///
/// Unlike `canonicalize()`, components that don't exist yet are kept as-is,
/// so a file about to be created still resolves. Dangling symlinks are
/// followed to their target, and `..` is applied after the preceding
/// component has been resolved, so `link/..` means the parent of the link
/// target and not the directory holding the link.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty path"));
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut queue = VecDeque::new();
    enqueue(&mut queue, &absolute);

    let mut resolved = PathBuf::new();
    let mut hops = 0;
    while let Some(part) = queue.pop_front() {
        match part {
            Part::Root(root) => resolved = root,
            Part::Parent => {
                resolved.pop();
            }
            Part::Name(name) => {
                let candidate = resolved.join(&name);
                match std::fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        hops += 1;
                        if hops > MAX_SYMLINK_HOPS {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidInput,
                                format!("too many levels of symbolic links: {}", path.display()),
                            ));
                        }
                        // A relative target resolves against `resolved`, which
                        // still points at the link's parent directory.
                        let target = std::fs::read_link(&candidate)?;
                        enqueue(&mut queue, &target);
                    }
                    Ok(_) => resolved = candidate,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => resolved = candidate,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(resolved)
}

/// Check whether `path` resolves to a location inside `workspace`.
///
/// Both sides are resolved first, and the comparison is per path component,
/// so `/workspace` never contains `/workspace-other`. Any resolution error
/// counts as "outside".
pub fn validate_workspace_path(path: impl AsRef<Path>, workspace: &Path) -> bool {
    let path = path.as_ref();
    let root = match resolve_path(workspace) {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!("cannot resolve workspace {}: {}", workspace.display(), e);
            return false;
        }
    };
    match resolve_path(path) {
        Ok(resolved) => resolved.starts_with(&root),
        Err(e) => {
            tracing::debug!("cannot resolve {}: {}", path.display(), e);
            false
        }
    }
}

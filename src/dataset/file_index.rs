//! Persisted file listings for dataset roots
//!
//! A dataset root is walked once and the resulting path list is written to
//! `cache_<key>.txt`, one path per line. Later calls with the same key read
//! that file back without touching the dataset root, so a stale listing
//! stays in effect until [`FileIndexCache::invalidate`] removes it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::core::{Error, Result};

const CACHE_FILE_PREFIX: &str = "cache_";
const CACHE_FILE_SUFFIX: &str = ".txt";

/// Case-insensitive file extension predicate
pub fn has_extension(ext: &str) -> impl Fn(&Path) -> bool + Send + Sync + 'static {
    let ext = ext.trim_start_matches('.').to_string();
    move |path: &Path| {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&ext))
    }
}

/// Recursively collect regular files under `root` accepted by `predicate`.
///
/// Paths are absolute and ordered by a file-name sorted walk, so repeated
/// walks of an unchanged tree produce the same list.
pub fn walk_files(root: &Path, predicate: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let root = std::fs::canonicalize(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::DatasetNotFound(root.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && predicate(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Place `path`, found under `root`, at the same relative location under
/// `out_root` with its extension replaced by `extension`.
///
/// Mirroring the tree keeps files that share a name in different
/// subdirectories apart.
pub fn mirrored_path(path: &Path, root: &Path, out_root: &Path, extension: &str) -> Result<PathBuf> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::Config(format!("{} is not under {}", path.display(), root.display()))
    })?;
    if relative.as_os_str().is_empty() {
        return Err(Error::Config(format!("{} has no file name under {}", path.display(), root.display())));
    }
    Ok(out_root.join(relative).with_extension(extension))
}

/// On-disk cache of dataset file listings, keyed by dataset name
#[derive(Clone, Debug)]
pub struct FileIndexCache {
    cache_dir: PathBuf,
}

impl FileIndexCache {
    /// Cache artifacts live in `cache_dir`
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Cache artifacts live in the process working directory
    pub fn in_working_dir() -> Self {
        Self::new(PathBuf::from("."))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the artifact for `key`
    pub fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}{}{}", CACHE_FILE_PREFIX, key, CACHE_FILE_SUFFIX))
    }

    /// Check if an artifact exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.cache_path(key).is_file()
    }

    /// Return the cached listing for `key`, walking `root` to create it if missing.
    ///
    /// A cache hit is returned verbatim; `root` is not checked.
    pub fn list_or_load(
        &self,
        root: &Path,
        key: &str,
        predicate: impl Fn(&Path) -> bool,
    ) -> Result<Vec<PathBuf>> {
        validate_key(key)?;

        let cache_path = self.cache_path(key);
        if cache_path.is_file() {
            let paths = read_listing(&cache_path)?;
            log::info!("Restored {} paths from {}", paths.len(), cache_path.display());
            return Ok(paths);
        }

        let start = Instant::now();
        let paths: Vec<PathBuf> = walk_files(root, predicate)?
            .into_iter()
            .filter(|p| {
                let listable = is_listable(p);
                if !listable {
                    log::warn!("Skipping {:?}: not representable in a line-based listing", p);
                }
                listable
            })
            .collect();
        log::info!("Walked {} in {:.1}s, {} files found",
            root.display(), start.elapsed().as_secs_f64(), paths.len());

        self.persist(&cache_path, &paths)?;
        log::info!("Cached in {}", cache_path.display());

        Ok(paths)
    }

    /// Delete the artifact for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        match std::fs::remove_file(self.cache_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop any cached listing for `key` and walk `root` again
    pub fn rebuild(
        &self,
        root: &Path,
        key: &str,
        predicate: impl Fn(&Path) -> bool,
    ) -> Result<Vec<PathBuf>> {
        self.invalidate(key)?;
        self.list_or_load(root, key, predicate)
    }

    /// Write through a temp file and rename, so concurrent builders never
    /// expose a partial listing.
    fn persist(&self, cache_path: &Path, paths: &[PathBuf]) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;

        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        {
            let mut writer = io::BufWriter::new(tmp.as_file_mut());
            for path in paths {
                writeln!(writer, "{}", path.display())?;
            }
            writer.flush()?;
        }
        tmp.persist(cache_path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(Error::Config(format!("invalid cache key '{}'", key)));
    }
    Ok(())
}

/// Valid UTF-8 without line breaks, so it survives one-path-per-line storage
fn is_listable(path: &Path) -> bool {
    path.to_str().is_some_and(|s| !s.contains(['\n', '\r']))
}

fn read_listing(path: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().filter(|l| !l.is_empty()).map(PathBuf::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir failed");
        std::fs::write(path, b"").expect("write failed");
    }

    fn make_tree(root: &Path) {
        touch(&root.join("b").join("002.png"));
        touch(&root.join("a").join("001.png"));
        touch(&root.join("a").join("deep").join("003.PNG"));
        touch(&root.join("a").join("notes.txt"));
        touch(&root.join("004.png"));
    }

    #[test]
    fn test_walk_filters_and_orders() {
        let data = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());

        let files = walk_files(data.path(), has_extension("png")).expect("walk failed");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["004.png", "001.png", "003.PNG", "002.png"]);
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_mirrored_paths_keep_shared_stems_apart() {
        let data = TempDir::new().expect("failed to create temp dir");
        touch(&data.path().join("a").join("001.bnt"));
        touch(&data.path().join("b").join("001.bnt"));

        let root = std::fs::canonicalize(data.path()).unwrap();
        let files = walk_files(&root, has_extension("bnt")).unwrap();
        let out = Path::new("/out");
        let mirrored: Vec<_> = files
            .iter()
            .map(|p| mirrored_path(p, &root, out, "binvox").unwrap())
            .collect();

        assert_eq!(mirrored, vec![out.join("a").join("001.binvox"), out.join("b").join("001.binvox")]);
    }

    #[test]
    fn test_mirrored_path_outside_root() {
        let result = mirrored_path(Path::new("/elsewhere/x.bnt"), Path::new("/data"), Path::new("/out"), "binvox");
        assert!(matches!(result, Err(Error::Config(_))));
        let result = mirrored_path(Path::new("/data"), Path::new("/data"), Path::new("/out"), "binvox");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_root() {
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());

        let result = cache.list_or_load(&cache_dir.path().join("missing"), "ds", has_extension("png"));
        assert!(matches!(result, Err(Error::DatasetNotFound(_))));
        assert!(!cache.contains("ds"));
    }

    #[test]
    fn test_first_call_creates_artifact() {
        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());

        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let paths = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();

        assert_eq!(paths.len(), 4);
        assert!(cache.contains("faces"));

        let text = std::fs::read_to_string(cache.cache_path("faces")).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(cache.cache_path("faces").file_name().unwrap(), "cache_faces.txt");
    }

    #[test]
    fn test_second_call_identical() {
        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());

        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let first = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();
        let second = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_hit_ignores_filesystem() {
        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());

        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let first = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();

        touch(&data.path().join("c").join("005.png"));
        let stale = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();
        assert_eq!(stale, first);

        let fresh = cache.rebuild(data.path(), "faces", has_extension("png")).unwrap();
        assert_eq!(fresh.len(), 5);
    }

    #[test]
    fn test_invalidate_and_rebuild_same_set() {
        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());

        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let first = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();

        assert!(cache.invalidate("faces").unwrap());
        assert!(!cache.invalidate("faces").unwrap());

        let again = cache.list_or_load(data.path(), "faces", has_extension("png")).unwrap();
        let a: HashSet<_> = first.into_iter().collect();
        let b: HashSet<_> = again.into_iter().collect();
        assert_eq!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_names_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());
        touch(&data.path().join("line\nbreak.png"));
        // Some filesystems refuse non-UTF-8 names; either way it must not be listed
        let _ = std::fs::write(data.path().join(OsStr::from_bytes(b"caf\xe9.png")), b"");

        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let first = cache.list_or_load(data.path(), "odd", has_extension("png")).unwrap();
        assert_eq!(first.len(), 4);

        let second = cache.list_or_load(data.path(), "odd", has_extension("png")).unwrap();
        assert_eq!(first, second);
        assert!(second.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_keys_are_independent() {
        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());

        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let png = cache.list_or_load(data.path(), "png", has_extension("png")).unwrap();
        let txt = cache.list_or_load(data.path(), "txt", has_extension(".txt")).unwrap();
        assert_eq!(png.len(), 4);
        assert_eq!(txt.len(), 1);
    }

    #[test]
    fn test_invalid_key() {
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());
        let result = cache.list_or_load(cache_dir.path(), "../escape", has_extension("png"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_concurrent_population() {
        let data = TempDir::new().expect("failed to create temp dir");
        let cache_dir = TempDir::new().expect("failed to create temp dir");
        make_tree(data.path());
        let cache = FileIndexCache::new(cache_dir.path().to_path_buf());

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.list_or_load(data.path(), "race", has_extension("png"))))
                .collect();
            for h in handles {
                assert_eq!(h.join().unwrap().unwrap().len(), 4);
            }
        });

        let listing = read_listing(&cache.cache_path("race")).unwrap();
        assert_eq!(listing.len(), 4);
    }
}

//! Path and artifact store.
//!
//! Every file the crate reads or writes goes through [`PathStore`]: paths are
//! normalised and confined to an allow-list of directories, sizes are capped,
//! and generated artifact names follow one timestamped scheme.

use crate::audio::buffer::{AudioAsset, AudioBuffer};
use crate::audio::wav::{self, WavInfo};
use crate::defaults;
use crate::error::{Result, VoxError};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Directories under these roots are never touched, even if allow-listed.
const FORBIDDEN_ROOTS: &[&str] = &["/proc", "/etc", "/sys", "/dev"];

/// Settings for a [`PathStore`].
///
/// Relative directories resolve against `base_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub base_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub allowed_dirs: Vec<PathBuf>,
    pub max_audio_bytes: u64,
    pub max_text_file_bytes: u64,
    pub max_text_content_bytes: u64,
}

impl StoreConfig {
    /// Default layout (`input/`, `output/`) rooted at `base_dir`.
    pub fn rooted_at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            input_dir: PathBuf::from(defaults::INPUT_DIR),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            allowed_dirs: defaults::ALLOWED_DIRS.iter().map(PathBuf::from).collect(),
            max_audio_bytes: defaults::MAX_AUDIO_FILE_MB * 1024 * 1024,
            max_text_file_bytes: defaults::MAX_TEXT_FILE_MB * 1024 * 1024,
            max_text_content_bytes: defaults::MAX_TEXT_CONTENT_KB * 1024,
        }
    }
}

/// Kinds of artifact the store can look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `*.wav` in the input directory.
    Recording,
    /// `*.txt` in the output directory.
    Transcript,
    /// `audio_out_*.wav` in the output directory.
    Synthesized,
}

/// An audio file that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAudio {
    pub path: PathBuf,
    pub info: WavInfo,
}

#[derive(Debug, Clone)]
pub struct PathStore {
    base_dir: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
    allowed_dirs: Vec<PathBuf>,
    max_audio_bytes: u64,
    max_text_file_bytes: u64,
    max_text_content_bytes: u64,
}

impl PathStore {
    pub fn new(config: StoreConfig) -> Self {
        let base_dir = normalize(&expand_tilde(&config.base_dir));
        let resolve = |p: &Path| {
            let expanded = expand_tilde(p);
            if expanded.is_absolute() {
                normalize(&expanded)
            } else {
                normalize(&base_dir.join(expanded))
            }
        };
        let input_dir = resolve(&config.input_dir);
        let output_dir = resolve(&config.output_dir);
        let allowed_dirs = config.allowed_dirs.iter().map(|d| resolve(d)).collect();

        Self {
            base_dir,
            input_dir,
            output_dir,
            allowed_dirs,
            max_audio_bytes: config.max_audio_bytes,
            max_text_file_bytes: config.max_text_file_bytes,
            max_text_content_bytes: config.max_text_content_bytes,
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn allowed_dirs(&self) -> &[PathBuf] {
        &self.allowed_dirs
    }

    /// Where `path` points relative to the base directory. No safety checks;
    /// use [`PathStore::sanitize`] before touching the file.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = expand_tilde(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        }
    }

    /// Normalise `path` to an absolute path and confirm it is safe to use.
    ///
    /// Rejects empty paths, `..` components, UNC prefixes, system
    /// directories, and anything outside the allow-list (after following
    /// symlinks when the path exists).
    pub fn sanitize(&self, path: &Path) -> Result<PathBuf> {
        let raw = path.to_string_lossy();
        if raw.trim().is_empty() {
            return Err(VoxError::security("<empty>", "path is empty"));
        }
        if raw.starts_with("\\\\") || raw.starts_with("//") {
            return Err(VoxError::security(&raw, "network paths are not allowed"));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(VoxError::security(&raw, "path traversal is not allowed"));
        }

        let expanded = expand_tilde(path);
        let absolute = if expanded.is_absolute() {
            normalize(&expanded)
        } else {
            normalize(&self.base_dir.join(expanded))
        };

        if FORBIDDEN_ROOTS
            .iter()
            .any(|root| absolute.starts_with(root))
        {
            return Err(VoxError::security(
                absolute.display(),
                "system directories are not allowed",
            ));
        }

        if !self.is_allowed(&absolute) {
            return Err(VoxError::security(
                absolute.display(),
                "outside allowed directories",
            ));
        }

        if let Ok(real) = fs::canonicalize(&absolute)
            && real != absolute
        {
            let allowed_real = self.allowed_dirs.iter().any(|dir| {
                let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.clone());
                real.starts_with(dir)
            });
            if !allowed_real {
                return Err(VoxError::security(
                    absolute.display(),
                    format!("resolves outside allowed directories ({})", real.display()),
                ));
            }
        }

        Ok(absolute)
    }

    fn is_allowed(&self, absolute: &Path) -> bool {
        self.allowed_dirs.iter().any(|dir| absolute.starts_with(dir))
    }

    /// Ensure `path` exists as a directory; returns the sanitised path.
    pub fn prepare_directory(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(VoxError::DirectoryFailed {
                path: String::new(),
                message: "directory path is empty".to_string(),
            });
        }
        let dir = self.sanitize(path)?;
        fs::create_dir_all(&dir).map_err(|e| VoxError::DirectoryFailed {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(dir)
    }

    fn prepare_parent(&self, file: &Path) -> Result<()> {
        match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.prepare_directory(parent).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Persist an audio asset at `path`.
    ///
    /// Buffers are encoded as 16-bit PCM WAV; files are copied.
    pub fn save(&self, asset: &AudioAsset, path: &Path) -> Result<PathBuf> {
        match asset {
            AudioAsset::Buffer(buffer) => self.save_audio(buffer, path),
            AudioAsset::File(source) => {
                let source = self.validate_audio_file(source)?.path;
                let target = self.sanitize(path)?;
                self.prepare_parent(&target)?;
                fs::copy(&source, &target).map_err(|e| VoxError::SaveFailed {
                    path: target.display().to_string(),
                    message: e.to_string(),
                })?;
                debug!(from = %source.display(), to = %target.display(), "Copied audio");
                Ok(target)
            }
        }
    }

    pub fn save_audio(&self, buffer: &AudioBuffer, path: &Path) -> Result<PathBuf> {
        let target = self.sanitize(path)?;
        let encoded_size = buffer.samples.len() as u64 * 2 + 44;
        if encoded_size > self.max_audio_bytes {
            return Err(VoxError::security(
                target.display(),
                format!(
                    "audio of {} bytes exceeds limit of {} bytes",
                    encoded_size, self.max_audio_bytes
                ),
            ));
        }
        self.prepare_parent(&target)?;
        wav::write_wav(&target, buffer)?;
        debug!(path = %target.display(), secs = buffer.duration_secs(), "Saved audio");
        Ok(target)
    }

    pub fn save_text(&self, text: &str, path: &Path) -> Result<PathBuf> {
        let target = self.sanitize(path)?;
        warn_on_unusual_extension(&target);
        if text.len() as u64 > self.max_text_content_bytes {
            return Err(VoxError::security(
                target.display(),
                format!(
                    "text of {} bytes exceeds limit of {} bytes",
                    text.len(),
                    self.max_text_content_bytes
                ),
            ));
        }
        self.prepare_parent(&target)?;
        fs::write(&target, text).map_err(|e| VoxError::SaveFailed {
            path: target.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %target.display(), bytes = text.len(), "Saved text");
        Ok(target)
    }

    /// Read a text file and return its trimmed contents.
    pub fn read_text(&self, path: &Path) -> Result<String> {
        let source = self.sanitize(path)?;
        warn_on_unusual_extension(&source);
        let read_failed = |message: String| VoxError::ReadFailed {
            path: source.display().to_string(),
            message,
        };

        let metadata = fs::metadata(&source).map_err(|e| read_failed(e.to_string()))?;
        if !metadata.is_file() {
            return Err(read_failed("not a regular file".to_string()));
        }
        if metadata.len() > self.max_text_file_bytes {
            return Err(VoxError::security(
                source.display(),
                format!(
                    "file of {} bytes exceeds limit of {} bytes",
                    metadata.len(),
                    self.max_text_file_bytes
                ),
            ));
        }

        let contents = fs::read_to_string(&source).map_err(|e| read_failed(e.to_string()))?;
        Ok(contents.trim().to_string())
    }

    /// Check that `path` is a readable WAV file with a sane format.
    pub fn validate_audio_file(&self, path: &Path) -> Result<ValidatedAudio> {
        let source = self.sanitize(path)?;
        let read_failed = |message: String| VoxError::ReadFailed {
            path: source.display().to_string(),
            message,
        };

        let metadata = fs::metadata(&source).map_err(|e| read_failed(e.to_string()))?;
        if !metadata.is_file() {
            return Err(read_failed("not a regular file".to_string()));
        }
        if metadata.len() > self.max_audio_bytes {
            return Err(VoxError::security(
                source.display(),
                format!(
                    "audio file of {} bytes exceeds limit of {} bytes",
                    metadata.len(),
                    self.max_audio_bytes
                ),
            ));
        }

        let info = wav::inspect(&source)?;
        if info.channels < 1 {
            return Err(read_failed("audio has no channels".to_string()));
        }
        if info.bits_per_sample < 8 {
            return Err(read_failed(format!(
                "unsupported sample width of {} bits",
                info.bits_per_sample
            )));
        }
        if !(defaults::MIN_SAMPLE_RATE..=defaults::MAX_SAMPLE_RATE).contains(&info.sample_rate) {
            return Err(read_failed(format!(
                "sample rate {} Hz outside {}..={} Hz",
                info.sample_rate,
                defaults::MIN_SAMPLE_RATE,
                defaults::MAX_SAMPLE_RATE
            )));
        }

        Ok(ValidatedAudio { path: source, info })
    }

    /// `<output>/audio_out_<timestamp>.wav`, never an existing file.
    pub fn generate_output_path(&self) -> PathBuf {
        unique_path(
            &self.output_dir,
            &format!("{}{}", defaults::AUDIO_OUT_PREFIX, timestamp()),
            "wav",
        )
    }

    /// `<input>/recording_<timestamp>.wav`, never an existing file.
    pub fn recording_path(&self) -> PathBuf {
        unique_path(
            &self.input_dir,
            &format!("{}{}", defaults::RECORDING_PREFIX, timestamp()),
            "wav",
        )
    }

    /// `<output>/<safe source stem>_<timestamp>.txt`.
    pub fn transcript_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let safe: String = stem
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        let base = if safe.is_empty() {
            defaults::TRANSCRIPT_FALLBACK_NAME.to_string()
        } else {
            safe
        };
        unique_path(&self.output_dir, &format!("{}_{}", base, timestamp()), "txt")
    }

    /// Newest artifact of `kind` by modification time, if any.
    pub fn most_recent_artifact(&self, kind: ArtifactKind) -> Result<Option<PathBuf>> {
        let dir = match kind {
            ArtifactKind::Recording => &self.input_dir,
            ArtifactKind::Transcript | ArtifactKind::Synthesized => &self.output_dir,
        };
        if !dir.is_dir() {
            return Ok(None);
        }

        let entries = fs::read_dir(dir).map_err(|e| VoxError::SourceFailed {
            message: format!("failed to list {}: {}", dir.display(), e),
        })?;

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !matches_kind(&path, kind) {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            let is_newer = match &newest {
                Some((time, current)) => (modified, &path) > (*time, current),
                None => true,
            };
            if is_newer {
                newest = Some((modified, path));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }

    /// Contents of the newest transcript, if one exists.
    pub fn load_latest_transcription(&self) -> Result<Option<String>> {
        match self.most_recent_artifact(ArtifactKind::Transcript)? {
            Some(path) => {
                debug!(path = %path.display(), "Loading latest transcript");
                self.read_text(&path).map(Some)
            }
            None => Ok(None),
        }
    }
}

fn matches_kind(path: &Path, kind: ArtifactKind) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match kind {
        ArtifactKind::Recording => ext == "wav",
        ArtifactKind::Transcript => ext == "txt",
        ArtifactKind::Synthesized => {
            ext == "wav"
                && path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(defaults::AUDIO_OUT_PREFIX))
        }
    }
}

fn warn_on_unusual_extension(path: &Path) {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !defaults::TEXT_EXTENSIONS.contains(&ext.as_str()) {
        warn!(path = %path.display(), "Unusual extension for a text file");
    }
}

fn timestamp() -> String {
    chrono::Local::now()
        .format(defaults::TIMESTAMP_FORMAT)
        .to_string()
}

fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, ext));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> PathStore {
        let mut config = StoreConfig::rooted_at(dir.path());
        config.allowed_dirs = vec![PathBuf::from("input"), PathBuf::from("output")];
        PathStore::new(config)
    }

    fn touch_with_age(path: &Path, contents: &str, age_secs: u64) {
        fs::write(path, contents).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn directories_resolve_against_base() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.input_dir(), dir.path().join("input"));
        assert_eq!(store.output_dir(), dir.path().join("output"));
    }

    #[test]
    fn sanitize_accepts_relative_path_inside_allow_list() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let path = store.sanitize(Path::new("output/./notes.txt")).unwrap();
        assert_eq!(path, dir.path().join("output").join("notes.txt"));
    }

    #[test]
    fn sanitize_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.sanitize(Path::new("output/../../secret.txt")).unwrap_err();
        assert!(matches!(err, VoxError::Security { .. }));
        assert!(err.to_string().contains("traversal"));
    }

    #[test]
    fn sanitize_rejects_outside_allow_list() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.sanitize(&dir.path().join("elsewhere/a.txt")).unwrap_err();
        assert!(err.to_string().contains("outside allowed directories"));
    }

    #[test]
    fn sanitize_rejects_system_dirs_even_when_allowed() {
        let mut config = StoreConfig::rooted_at("/");
        config.allowed_dirs = vec![PathBuf::from("/")];
        let store = PathStore::new(config);
        for bad in ["/etc/passwd", "/proc/self/mem", "/sys/kernel", "/dev/null"] {
            let err = store.sanitize(Path::new(bad)).unwrap_err();
            assert!(
                err.to_string().contains("system directories"),
                "{} -> {}",
                bad,
                err
            );
        }
    }

    #[test]
    fn sanitize_rejects_empty_and_unc_paths() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.sanitize(Path::new("")).is_err());
        assert!(store.sanitize(Path::new("   ")).is_err());
        assert!(store.sanitize(Path::new("\\\\server\\share")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn sanitize_rejects_symlink_escaping_allow_list() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.output_dir()).unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, "hidden").unwrap();
        let link = store.output_dir().join("link.txt");
        std::os::unix::fs::symlink(&secret, &link).unwrap();

        let err = store.read_text(&link).unwrap_err();
        assert!(matches!(err, VoxError::Security { .. }), "got {:?}", err);
    }

    #[test]
    fn prepare_directory_creates_nested_dirs() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let created = store.prepare_directory(Path::new("output/a/b")).unwrap();
        assert!(created.is_dir());
    }

    #[test]
    fn prepare_directory_rejects_empty_path() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.prepare_directory(Path::new("")).unwrap_err();
        assert_eq!(err.code().as_str(), "DIRECTORY_FAILED");
    }

    #[test]
    fn save_text_then_read_text_trims() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let saved = store
            .save_text("  hello there \n", Path::new("output/t/hello.txt"))
            .unwrap();
        assert!(saved.exists());
        assert_eq!(store.read_text(&saved).unwrap(), "hello there");
    }

    #[test]
    fn save_text_rejects_oversized_content() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::rooted_at(dir.path());
        config.max_text_content_bytes = 4;
        let store = PathStore::new(config);
        let err = store
            .save_text("too long", Path::new("output/x.txt"))
            .unwrap_err();
        assert!(matches!(err, VoxError::Security { .. }));
        assert!(!dir.path().join("output/x.txt").exists());
    }

    #[test]
    fn read_text_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::rooted_at(dir.path());
        config.max_text_file_bytes = 3;
        let store = PathStore::new(config);
        fs::create_dir_all(store.output_dir()).unwrap();
        let path = store.output_dir().join("big.txt");
        fs::write(&path, "abcdef").unwrap();
        assert!(matches!(
            store.read_text(&path),
            Err(VoxError::Security { .. })
        ));
    }

    #[test]
    fn read_text_missing_file_is_read_failure() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.read_text(Path::new("input/missing.txt")).unwrap_err();
        assert_eq!(err.code().as_str(), "READ_FAILED");
    }

    #[test]
    fn save_buffer_and_validate_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let buffer = AudioBuffer::mono(vec![0; 16000], 16000);
        let saved = store
            .save(&AudioAsset::Buffer(buffer), Path::new("output/a.wav"))
            .unwrap();
        let validated = store.validate_audio_file(&saved).unwrap();
        assert_eq!(validated.path, saved);
        assert_eq!(validated.info.sample_rate, 16000);
        assert_eq!(validated.info.frames, 16000);
    }

    #[test]
    fn save_file_asset_copies() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let original = store
            .save_audio(&AudioBuffer::mono(vec![5; 100], 16000), Path::new("input/r.wav"))
            .unwrap();
        let copy = store
            .save(&AudioAsset::File(original.clone()), Path::new("output/copy.wav"))
            .unwrap();
        assert_eq!(fs::read(&original).unwrap(), fs::read(&copy).unwrap());
    }

    #[test]
    fn save_audio_rejects_oversized_buffer() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::rooted_at(dir.path());
        config.max_audio_bytes = 100;
        let store = PathStore::new(config);
        let err = store
            .save_audio(&AudioBuffer::mono(vec![0; 1000], 16000), Path::new("output/a.wav"))
            .unwrap_err();
        assert!(matches!(err, VoxError::Security { .. }));
    }

    #[test]
    fn validate_audio_rejects_non_wav() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.input_dir()).unwrap();
        let path = store.input_dir().join("fake.wav");
        fs::write(&path, "not audio at all").unwrap();
        let err = store.validate_audio_file(&path).unwrap_err();
        assert_eq!(err.code().as_str(), "READ_FAILED");
    }

    #[test]
    fn validate_audio_rejects_out_of_range_sample_rate() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.input_dir()).unwrap();
        let path = store.input_dir().join("slow.wav");
        wav::write_wav(&path, &AudioBuffer::mono(vec![0; 10], 4000)).unwrap();
        let err = store.validate_audio_file(&path).unwrap_err();
        assert!(err.to_string().contains("sample rate 4000"), "got: {}", err);
    }

    #[test]
    fn generated_names_follow_scheme() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let out = store.generate_output_path();
        assert_eq!(out.parent().unwrap(), store.output_dir());
        let name = out.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("audio_out_") && name.ends_with(".wav"), "{}", name);
        // audio_out_YYYYmmdd-HHMMSS.wav
        assert_eq!(name.len(), "audio_out_".len() + 15 + ".wav".len());

        let rec = store.recording_path();
        assert_eq!(rec.parent().unwrap(), store.input_dir());
        assert!(rec.file_name().unwrap().to_string_lossy().starts_with("recording_"));
    }

    #[test]
    fn generated_output_path_skips_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.output_dir()).unwrap();
        let first = store.generate_output_path();
        fs::write(&first, b"x").unwrap();
        let second = store.generate_output_path();
        assert_ne!(first, second);
    }

    #[test]
    fn transcript_path_uses_safe_stem() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let path = store.transcript_path_for(Path::new("/x/my talk (1).wav"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("mytalk1_"), "{}", name);
        assert!(name.ends_with(".txt"));

        let path = store.transcript_path_for(Path::new("/x/()!.wav"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("transcription_"), "{}", name);
    }

    #[test]
    fn most_recent_artifact_picks_newest_of_kind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.output_dir()).unwrap();
        let out = store.output_dir();

        touch_with_age(&out.join("old.txt"), "old", 60);
        touch_with_age(&out.join("new.txt"), "new", 5);
        touch_with_age(&out.join("newest.md"), "ignored", 1);
        touch_with_age(&out.join("audio_out_1.wav"), "w", 30);
        touch_with_age(&out.join("other.wav"), "w", 2);

        assert_eq!(
            store.most_recent_artifact(ArtifactKind::Transcript).unwrap(),
            Some(out.join("new.txt"))
        );
        assert_eq!(
            store.most_recent_artifact(ArtifactKind::Synthesized).unwrap(),
            Some(out.join("audio_out_1.wav"))
        );
        assert_eq!(store.load_latest_transcription().unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn most_recent_artifact_none_when_dir_missing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.most_recent_artifact(ArtifactKind::Recording).unwrap(), None);
        assert_eq!(store.load_latest_transcription().unwrap(), None);
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/x")), home.join("x"));
        }
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}

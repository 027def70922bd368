use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use recolor_pipeline::Image;
use tempfile::NamedTempFile;

use crate::naming::{ArtifactId, StageTag, final_component};
use crate::{Result, StoreError};

/// Filesystem-backed store for uploads and derived artifacts.
///
/// Layout: raw uploads under `<upload_dir>/<file name>`, PNG artifacts
/// under `<artifact_dir>/<artifact id>`. Every write goes to a temporary
/// file in the target directory and is renamed into place, so readers
/// see either the previous file or the complete new one.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    artifact_dir: PathBuf,
}

impl ArtifactStore {
    /// Open a store, creating both directories if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if a directory cannot be created.
    pub fn open(upload_dir: impl AsRef<Path>, artifact_dir: impl AsRef<Path>) -> Result<Self> {
        let upload_dir = upload_dir.as_ref().to_path_buf();
        let artifact_dir = artifact_dir.as_ref().to_path_buf();
        for dir in [&upload_dir, &artifact_dir] {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self {
            upload_dir,
            artifact_dir,
        })
    }

    /// Directory holding raw uploads.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Directory holding PNG artifacts.
    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Where the artifact `id` lives (whether or not it exists yet).
    #[must_use]
    pub fn path_of(&self, id: &ArtifactId) -> PathBuf {
        self.artifact_dir.join(id.as_str())
    }

    /// Returns `true` if the artifact `id` has been written.
    #[must_use]
    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.path_of(id).is_file()
    }

    /// Store the raw bytes of an uploaded file.
    ///
    /// Only the final path component of `filename` is used. Returns the
    /// name the upload was stored under.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `filename` has no file name,
    /// or a persistence error if the write fails.
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let name = upload_name(filename)?;
        let path = self.upload_dir.join(name);
        write_atomic(&self.upload_dir, &path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored upload");
        Ok(name.to_owned())
    }

    /// Decode a previously stored upload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no upload has that name, or
    /// [`StoreError::Decode`] if its bytes are not an image.
    pub fn load_upload(&self, filename: &str) -> Result<Image> {
        let name = upload_name(filename)?;
        read_image(&self.upload_dir.join(name), name)
    }

    /// Encode `image` as PNG and store it as the artifact for
    /// `source_name` at `stage`.
    ///
    /// An existing artifact with the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `source_name` has no base
    /// name, [`StoreError::Encode`] if PNG encoding fails, or a
    /// persistence error if the file cannot be written and verified.
    pub fn put(&self, stage: &StageTag, source_name: &str, image: &Image) -> Result<ArtifactId> {
        let id = ArtifactId::derive(source_name, stage)?;
        let png = encode_png(image)?;
        let path = self.path_of(&id);
        write_atomic(&self.artifact_dir, &path, &png)?;
        tracing::debug!(
            artifact = %id,
            dimensions = %image.dimensions(),
            bytes = png.len(),
            "persisted artifact"
        );
        Ok(id)
    }

    /// Load and decode the artifact `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the artifact does not exist, or
    /// [`StoreError::Decode`] if the file is not a readable image.
    pub fn get(&self, id: &ArtifactId) -> Result<Image> {
        read_image(&self.path_of(id), id.as_str())
    }
}

/// The final path component of an upload's file name.
fn upload_name(filename: &str) -> Result<&str> {
    let name = final_component(filename);
    if name.is_empty() || name == "." || name == ".." {
        return Err(StoreError::InvalidName {
            name: filename.to_owned(),
            reason: "upload has no file name",
        });
    }
    Ok(name)
}

fn encode_png(image: &Image) -> Result<Vec<u8>> {
    let rgb = image.to_rgb();
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(StoreError::Encode)?;
    Ok(buf)
}

fn read_image(path: &Path, name: &str) -> Result<Image> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                name: name.to_owned(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Image::decode(&bytes).map_err(|source| StoreError::Decode {
        name: name.to_owned(),
        source,
    })
}

/// Write `bytes` to `path` through a temporary file in `dir`, then
/// confirm the file is present with the expected length.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let persist_err = |source: io::Error| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(bytes).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;

    let written = fs::metadata(path).map_err(persist_err)?.len();
    if written != bytes.len() as u64 {
        return Err(StoreError::Unverified {
            path: path.to_path_buf(),
            expected: bytes.len() as u64,
            found: written,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use recolor_pipeline::{ChannelOrder, Dimensions, FilterSpec, PipelineError, RgbImage};

    use super::*;

    fn make_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("uploads"), dir.path().join("static"))
            .unwrap();
        (dir, store)
    }

    fn solid(width: u32, height: u32, value: [u8; 3]) -> Image {
        Image::from_rgb(RgbImage::from_pixel(width, height, image::Rgb(value)))
    }

    fn tag(s: &str) -> StageTag {
        StageTag::new(s).unwrap()
    }

    #[test]
    fn open_creates_directories() {
        let (dir, store) = make_store();
        assert!(dir.path().join("uploads").is_dir());
        assert!(dir.path().join("static").is_dir());
        assert_eq!(store.artifact_dir(), dir.path().join("static"));
    }

    #[test]
    fn put_then_get_round_trips_pixels() {
        let (_dir, store) = make_store();
        let image = Image::from_rgb(RgbImage::from_fn(7, 5, |x, y| {
            image::Rgb([u8::try_from(x * 30).unwrap(), u8::try_from(y * 40).unwrap(), 9])
        }));
        let id = store.put(&tag("eccv16"), "photo.jpg", &image).unwrap();
        assert_eq!(id.as_str(), "photo_eccv16.png");
        assert!(store.contains(&id));
        assert_eq!(store.get(&id).unwrap(), image);
    }

    #[test]
    fn bgr_images_are_stored_as_rgb() {
        let (_dir, store) = make_store();
        let bgr = Image::from_bgr(RgbImage::from_pixel(3, 3, image::Rgb([255, 0, 0])));
        let id = store.put(&tag("m"), "blue.png", &bgr).unwrap();
        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.order(), ChannelOrder::Rgb);
        assert_eq!(loaded.pixels().get_pixel(1, 1).0, [0, 0, 255]);
    }

    #[test]
    fn filtered_artifact_name_chains_from_source_artifact() {
        let (_dir, store) = make_store();
        let first = store.put(&tag("eccv16"), "photo.jpg", &solid(4, 4, [1, 2, 3])).unwrap();
        let second = store
            .put(
                &StageTag::from(FilterSpec::Brighten),
                first.as_str(),
                &solid(4, 4, [4, 5, 6]),
            )
            .unwrap();
        assert_eq!(second.as_str(), "photo_eccv16_brighten.png");
    }

    #[test]
    fn later_write_replaces_earlier() {
        let (dir, store) = make_store();
        let first = solid(6, 6, [10, 10, 10]);
        let second = solid(9, 3, [200, 100, 0]);
        let a = store.put(&tag("m"), "same.png", &first).unwrap();
        let b = store.put(&tag("m"), "same.jpg", &second).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.get(&a).unwrap(), second);

        // No temporary files left behind.
        let entries: Vec<_> = fs::read_dir(dir.path().join("static")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn concurrent_writers_never_mix_content() {
        let (_dir, store) = make_store();
        let images: Vec<_> = (0..4u8)
            .map(|i| solid(32, 32, [i * 60, i * 60, i * 60]))
            .collect();
        std::thread::scope(|scope| {
            for image in &images {
                let store = &store;
                scope.spawn(move || store.put(&tag("m"), "race.png", image).unwrap());
            }
        });
        let id = ArtifactId::parse("race_m.png").unwrap();
        let stored = store.get(&id).unwrap();
        assert!(images.contains(&stored), "stored artifact mixes writers");
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, store) = make_store();
        let id = ArtifactId::parse("nope_eccv16.png").unwrap();
        assert!(matches!(
            store.get(&id),
            Err(StoreError::NotFound { name }) if name == "nope_eccv16.png"
        ));
    }

    #[test]
    fn get_corrupt_file_is_decode_error() {
        let (_dir, store) = make_store();
        let id = ArtifactId::parse("bad_m.png").unwrap();
        fs::write(store.path_of(&id), b"not a png").unwrap();
        let err = store.get(&id).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn upload_keeps_raw_bytes_under_base_name() {
        let (dir, store) = make_store();
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&[7; 12], 2, 2, image::ExtendedColorType::Rgb8)
            .unwrap();

        let name = store.save_upload("../../etc/photo.png", &png).unwrap();
        assert_eq!(name, "photo.png");
        assert_eq!(fs::read(dir.path().join("uploads/photo.png")).unwrap(), png);

        let loaded = store.load_upload(&name).unwrap();
        assert_eq!(loaded.dimensions(), Dimensions::new(2, 2));
    }

    #[test]
    fn upload_without_name_is_rejected() {
        let (_dir, store) = make_store();
        assert!(matches!(
            store.save_upload("dir/", b"x"),
            Err(StoreError::InvalidName { .. })
        ));
    }

    #[test]
    fn load_missing_upload_is_not_found() {
        let (_dir, store) = make_store();
        assert!(matches!(
            store.load_upload("ghost.png"),
            Err(StoreError::NotFound { .. })
        ));
    }
}

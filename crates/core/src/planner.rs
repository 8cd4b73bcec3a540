use crate::location::format_location_string;
use crate::metadata::{ImageFile, Place};
use crate::sanitize::sanitize_segment;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CAPTURE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const UNKNOWN_LOCATION_SEGMENT: &str = "Unknown_Location";
pub const UNSORTED_SEGMENT: &str = "Unsorted";

/// Derives `dest_root/YYYY/MM/<location>/<name>` destinations.
///
/// A path is free when nothing exists there on disk and no earlier call since
/// the last [`PathPlanner::reset`] has handed it out. The disk check is only
/// meaningful if the move executes right after planning.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    dest_root: PathBuf,
    reserved: HashSet<PathBuf>,
}

impl PathPlanner {
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
            reserved: HashSet::new(),
        }
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn reset(&mut self) {
        self.reserved.clear();
    }

    /// Never fails: any internal error sends the file to `Unsorted/`.
    pub fn plan(
        &mut self,
        image: &ImageFile,
        capture_time: Option<&str>,
        place: Option<&Place>,
    ) -> PathBuf {
        match self.try_plan(image, capture_time, place) {
            Ok(path) => path,
            Err(err) => {
                log::error!(
                    "failed to plan destination for {}: {err:#}",
                    image.path.display()
                );
                let name = image.file_name().unwrap_or_else(|| "untitled".to_string());
                self.dest_root.join(UNSORTED_SEGMENT).join(name)
            }
        }
    }

    fn try_plan(
        &mut self,
        image: &ImageFile,
        capture_time: Option<&str>,
        place: Option<&Place>,
    ) -> Result<PathBuf> {
        let reference = reference_time(capture_time, image);
        let dir = self
            .dest_root
            .join(reference.format("%Y").to_string())
            .join(reference.format("%m").to_string())
            .join(location_segment(place));

        let file_name = image
            .file_name()
            .with_context(|| format!("image has no file name: {}", image.path.display()))?;

        Ok(resolve_collision(&dir, &file_name, &mut self.reserved))
    }
}

/// Parses an EXIF-style `YYYY:MM:DD HH:MM:SS` timestamp.
pub fn parse_capture_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), CAPTURE_TIME_FORMAT).ok()
}

fn reference_time(capture_time: Option<&str>, image: &ImageFile) -> NaiveDateTime {
    if let Some(raw) = capture_time {
        if let Some(parsed) = parse_capture_time(raw) {
            return parsed;
        }
        log::debug!(
            "unparseable capture time {raw:?} for {}, using mtime",
            image.path.display()
        );
    }
    image.modified.naive_local()
}

pub fn location_segment(place: Option<&Place>) -> String {
    place
        .filter(|p| !p.is_empty())
        .and_then(|p| sanitize_segment(&format_location_string(Some(p))))
        .unwrap_or_else(|| UNKNOWN_LOCATION_SEGMENT.to_string())
}

fn resolve_collision(dir: &Path, file_name: &str, reserved: &mut HashSet<PathBuf>) -> PathBuf {
    let mut candidate = dir.join(file_name);
    if is_available(&candidate, reserved) {
        reserved.insert(candidate.clone());
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name
        .extension()
        .map(|v| format!(".{}", v.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1usize;
    loop {
        candidate = dir.join(format!("{stem}_{n}{extension}"));
        if is_available(&candidate, reserved) {
            reserved.insert(candidate.clone());
            return candidate;
        }
        n += 1;
    }
}

fn is_available(candidate: &Path, reserved: &HashSet<PathBuf>) -> bool {
    !reserved.contains(candidate) && !candidate.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::fs;
    use tempfile::tempdir;

    fn image(path: PathBuf) -> ImageFile {
        ImageFile {
            extension: "jpg".to_string(),
            modified: Local
                .with_ymd_and_hms(2020, 3, 9, 12, 0, 0)
                .single()
                .expect("valid mtime"),
            path,
        }
    }

    fn new_york() -> Place {
        Place {
            city: Some("New York".to_string()),
            region: Some("New York".to_string()),
            country: Some("US".to_string()),
        }
    }

    #[test]
    fn uses_capture_time_and_place() {
        let temp = tempdir().expect("tempdir");
        let mut planner = PathPlanner::new(temp.path());
        let img = image(temp.path().join("src").join("IMG_0001.jpg"));

        let dest = planner.plan(&img, Some("2023:08:15 10:00:00"), Some(&new_york()));
        assert_eq!(
            dest,
            temp.path()
                .join("2023")
                .join("08")
                .join("New York, New York, US")
                .join("IMG_0001.jpg")
        );
    }

    #[test]
    fn falls_back_to_mtime_for_missing_or_malformed_capture_time() {
        let temp = tempdir().expect("tempdir");
        let mut planner = PathPlanner::new(temp.path());
        let expected_dir = temp.path().join("2020").join("03").join(UNKNOWN_LOCATION_SEGMENT);

        let a = planner.plan(&image(temp.path().join("a.jpg")), None, None);
        let b = planner.plan(&image(temp.path().join("b.jpg")), Some("not a date"), None);
        let c = planner.plan(&image(temp.path().join("c.jpg")), Some("2023-08-15 10:00:00"), None);

        assert_eq!(a, expected_dir.join("a.jpg"));
        assert_eq!(b, expected_dir.join("b.jpg"));
        assert_eq!(c, expected_dir.join("c.jpg"));
    }

    #[test]
    fn empty_place_uses_sentinel_segment() {
        assert_eq!(location_segment(None), UNKNOWN_LOCATION_SEGMENT);
        assert_eq!(location_segment(Some(&Place::default())), UNKNOWN_LOCATION_SEGMENT);
        let partial = Place {
            city: Some("New York".to_string()),
            region: None,
            country: Some("US".to_string()),
        };
        assert_eq!(location_segment(Some(&partial)), "New York, US");
    }

    #[test]
    fn same_key_in_one_run_gets_suffix() {
        let temp = tempdir().expect("tempdir");
        let mut planner = PathPlanner::new(temp.path().join("dest"));
        let first = image(temp.path().join("a").join("IMG.jpg"));
        let second = image(temp.path().join("b").join("IMG.jpg"));

        let p1 = planner.plan(&first, Some("2023:08:15 10:00:00"), None);
        let p2 = planner.plan(&second, Some("2023:08:15 10:00:00"), None);

        assert_ne!(p1, p2);
        assert_eq!(p1.file_name().and_then(|v| v.to_str()), Some("IMG.jpg"));
        assert_eq!(p2.file_name().and_then(|v| v.to_str()), Some("IMG_1.jpg"));
        assert_eq!(p1.parent(), p2.parent());
    }

    #[test]
    fn existing_files_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("2023").join("08").join(UNKNOWN_LOCATION_SEGMENT);
        fs::create_dir_all(&dir).expect("create dir");
        fs::write(dir.join("IMG.jpg"), b"x").expect("occupy");
        fs::write(dir.join("IMG_1.jpg"), b"x").expect("occupy");

        let mut planner = PathPlanner::new(temp.path());
        let dest = planner.plan(
            &image(temp.path().join("IMG.jpg")),
            Some("2023:08:15 10:00:00"),
            None,
        );
        assert_eq!(dest, dir.join("IMG_2.jpg"));
    }

    #[test]
    fn reset_releases_reservations() {
        let temp = tempdir().expect("tempdir");
        let mut planner = PathPlanner::new(temp.path());
        let img = image(temp.path().join("IMG.jpg"));

        let first = planner.plan(&img, None, None);
        planner.reset();
        let again = planner.plan(&img, None, None);
        assert_eq!(first, again);
    }

    #[test]
    fn missing_file_name_goes_to_unsorted() {
        let temp = tempdir().expect("tempdir");
        let mut planner = PathPlanner::new(temp.path());
        let dest = planner.plan(&image(PathBuf::from("/")), None, None);
        assert_eq!(dest, temp.path().join(UNSORTED_SEGMENT).join("untitled"));
    }

    #[test]
    fn parse_capture_time_is_strict() {
        assert!(parse_capture_time("2023:08:15 10:00:00").is_some());
        assert!(parse_capture_time(" 2023:08:15 10:00:00 ").is_some());
        assert!(parse_capture_time("2023:13:15 10:00:00").is_none());
        assert!(parse_capture_time("").is_none());
    }
}

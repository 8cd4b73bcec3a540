mod apply;
mod config;
mod exif_reader;
mod location;
mod metadata;
mod oplog;
mod organizer;
mod planner;
mod sanitize;
mod tagger;

pub use apply::{move_file, undo_operations, UndoResult};
pub use config::{
    app_paths, load_config, save_config, AppConfig, AppPaths, GeocodingConfig, TaggingConfig,
    DISABLE_TAGGING_ENV,
};
pub use exif_reader::{read_exif_metadata, ExifExtractor, MetadataExtractor};
pub use location::{
    format_location_string, GazetteerResolver, LocationResolver, NoLocationResolver,
    UNKNOWN_LOCATION,
};
pub use metadata::{CaptureContext, Coordinates, ImageFile, ImageMetadata, Place, IMAGE_EXTENSIONS};
pub use oplog::{clear_last_log, load_last_log, save_last_log, OperationLog, PlannedMove};
pub use organizer::{OrganizeError, OrganizeStats, Organizer};
pub use planner::{
    location_segment, parse_capture_time, PathPlanner, CAPTURE_TIME_FORMAT,
    UNKNOWN_LOCATION_SEGMENT, UNSORTED_SEGMENT,
};
pub use tagger::{sidecar_path, write_sidecar, CommandTagger, NoopTagger, TagSidecar, Tagger};

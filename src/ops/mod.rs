mod batch;
mod json;

pub use batch::{parse_batch, requests_from_value};
pub use json::{
    Transform, apply_transforms, move_record, read_json, to_json_text, update_json, write_json,
};

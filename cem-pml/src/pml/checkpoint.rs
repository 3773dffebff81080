//! Checkpoint files of single fields.
//!
//! Layout: header length (`u64`, little endian), JSON header, lz4-compressed
//! field data (`f64` in native byte order, fab by fab).

use std::path::{
    Path,
    PathBuf,
};

use nalgebra::Vector3;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    error::Error,
    format_size,
    mesh::{
        BoxArray,
        MultiField,
    },
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Header {
    boxes: BoxArray,
    num_components: usize,
    guard_width: Vector3<i64>,
    num_values: usize,
}

impl Header {
    fn new(field: &MultiField) -> Self {
        Self {
            boxes: field.boxes().clone(),
            num_components: field.num_components(),
            guard_width: *field.guard_width(),
            num_values: field.fabs().iter().map(|fab| fab.data().len()).sum(),
        }
    }
}

/// Path of one field's checkpoint file, e.g. `<prefix>_Ex_fp`.
pub fn checkpoint_path(prefix: &Path, name: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push("_");
    path.push(name);
    path.into()
}

pub fn write_field(path: &Path, field: &MultiField) -> Result<(), Error> {
    let header = serde_json::to_vec(&Header::new(field)).map_err(|source| {
        Error::CheckpointHeader {
            path: path.to_owned(),
            source,
        }
    })?;

    let mut values: Vec<u8> = Vec::new();
    for fab in field.fabs() {
        values.extend_from_slice(bytemuck::cast_slice(fab.data()));
    }
    let data = lz4_flex::compress_prepend_size(&values);

    let mut bytes = Vec::with_capacity(8 + header.len() + data.len());
    bytes.extend_from_slice(&(header.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&data);

    std::fs::write(path, &bytes).map_err(|source| {
        Error::CheckpointIo {
            path: path.to_owned(),
            source,
        }
    })?;

    tracing::debug!(
        path = %path.display(),
        size = %format_size(bytes.len()),
        "wrote checkpoint"
    );

    Ok(())
}

/// Reads a checkpoint into an allocated field. The field's layout must match
/// the checkpoint's.
pub fn read_field(path: &Path, field: &mut MultiField) -> Result<(), Error> {
    let bytes = std::fs::read(path).map_err(|source| {
        Error::CheckpointIo {
            path: path.to_owned(),
            source,
        }
    })?;

    let mismatch = |reason: String| {
        Error::CheckpointMismatch {
            path: path.to_owned(),
            reason,
        }
    };

    let (length, rest) = bytes
        .split_first_chunk::<8>()
        .ok_or_else(|| mismatch("truncated header".to_owned()))?;
    let length = usize::try_from(u64::from_le_bytes(*length))
        .ok()
        .filter(|length| *length <= rest.len())
        .ok_or_else(|| mismatch("truncated header".to_owned()))?;
    let (header, data) = rest.split_at(length);

    let header: Header = serde_json::from_slice(header).map_err(|source| {
        Error::CheckpointHeader {
            path: path.to_owned(),
            source,
        }
    })?;

    let expected = Header::new(field);
    if header.boxes != expected.boxes {
        return Err(mismatch(format!(
            "{} boxes in checkpoint, {} allocated, or the boxes differ",
            header.boxes.len(),
            expected.boxes.len()
        )));
    }
    if header.num_components != expected.num_components {
        return Err(mismatch(format!(
            "{} components in checkpoint, {} allocated",
            header.num_components, expected.num_components
        )));
    }
    if header.guard_width != expected.guard_width {
        return Err(mismatch(format!(
            "guard width {:?} in checkpoint, {:?} allocated",
            header.guard_width, expected.guard_width
        )));
    }

    let data = lz4_flex::decompress_size_prepended(data).map_err(|source| {
        Error::CheckpointDecompress {
            path: path.to_owned(),
            source,
        }
    })?;
    let num_values = data.len() / size_of::<f64>();
    if num_values != expected.num_values || data.len() % size_of::<f64>() != 0 {
        return Err(mismatch(format!(
            "{num_values} values in checkpoint, {} allocated",
            expected.num_values
        )));
    }

    let mut offset = 0;
    for fab in field.fabs_mut() {
        let target = bytemuck::cast_slice_mut::<f64, u8>(fab.data_mut());
        let len = target.len();
        target.copy_from_slice(&data[offset..offset + len]);
        offset += len;
    }

    Ok(())
}

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use image::imageops::FilterType;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::shared::AppState;
use crate::tasks::{Result, TaskError, TaskRequest};

const IMAGE_INPUT: &str = "/data/image.png";

static DIMENSIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,5})\s*[xX]\s*(\d{1,5})").expect("valid regex"));

/// Target dimensions from the task text ("800x600"); absent that, the image
/// is halved.
fn requested_dimensions(task: &str) -> Option<(u32, u32)> {
    DIMENSIONS_RE.captures(task).and_then(|caps| {
        let w = caps[1].parse().ok()?;
        let h = caps[2].parse().ok()?;
        (w > 0 && h > 0).then_some((w, h))
    })
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    input.with_file_name(format!("{stem}-resized.{ext}"))
}

/// Resize an image to the requested dimensions, or to half size when no
/// dimensions are given. Decoding and encoding happen off the async runtime.
pub async fn resize_image(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, IMAGE_INPUT))?;
    let output = match req.paths.get(1) {
        Some(path) => state.sandbox.resolve(path)?,
        None => default_output(&input),
    };

    if !input.exists() {
        return Err(TaskError::MissingInput(input.display().to_string()));
    }

    let dimensions = requested_dimensions(req.task);
    let work_input = input.clone();
    let work_output = output.clone();

    let (width, height) = tokio::task::spawn_blocking(move || -> anyhow::Result<(u32, u32)> {
        let img = image::open(&work_input)
            .map_err(|e| anyhow!("failed to decode {}: {}", work_input.display(), e))?;

        let (width, height) =
            dimensions.unwrap_or((img.width().max(2) / 2, img.height().max(2) / 2));
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);

        if let Some(parent) = work_output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        resized
            .save(&work_output)
            .map_err(|e| anyhow!("failed to save {}: {}", work_output.display(), e))?;
        Ok((width, height))
    })
    .await
    .map_err(|e| anyhow!("image task panicked: {}", e))??;

    info!(width, height, output = %output.display(), "image resized");

    Ok(format!(
        "Resized {} to {}x{} at {}",
        input.display(),
        width,
        height,
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::state::test_state;

    #[test]
    fn reads_dimensions_from_the_task_text() {
        assert_eq!(requested_dimensions("resize to 800x600"), Some((800, 600)));
        assert_eq!(requested_dimensions("resize to 64 X 64"), Some((64, 64)));
        assert_eq!(requested_dimensions("resize the image"), None);
    }

    #[test]
    fn derives_a_resized_sibling_as_default_output() {
        assert_eq!(
            default_output(Path::new("/data/photo.png")),
            PathBuf::from("/data/photo-resized.png")
        );
    }

    #[tokio::test]
    async fn resizes_to_explicit_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let input = dir.path().join("image.png");
        image::RgbaImage::new(8, 8).save(&input).unwrap();

        let req = TaskRequest {
            task: "resize the image to 4x4",
            email: None,
            paths: vec!["image.png".to_string(), "small.png".to_string()],
        };
        resize_image(&state, &req).await.unwrap();

        let resized = image::open(dir.path().join("small.png")).unwrap();
        assert_eq!((resized.width(), resized.height()), (4, 4));
    }
}

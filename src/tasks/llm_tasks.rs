use anyhow::anyhow;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::info;

use crate::shared::AppState;
use crate::tasks::{read_input, read_input_bytes, write_output, Result, TaskError, TaskRequest};

const EMAIL_INPUT: &str = "/data/email.txt";
const EMAIL_OUTPUT: &str = "/data/email-sender.txt";
const CARD_INPUT: &str = "/data/credit-card.png";
const CARD_OUTPUT: &str = "/data/credit-card.txt";
const COMMENTS_INPUT: &str = "/data/comments.txt";
const COMMENTS_OUTPUT: &str = "/data/comments-similar.txt";

/// Ask the model for the sender address of an email message and write just
/// the address.
pub async fn extract_sender_email(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, EMAIL_INPUT))?;
    let output = state.sandbox.resolve(&req.path_or(1, EMAIL_OUTPUT))?;

    let message = read_input(&input).await?;

    let answer = state
        .llm
        .chat(
            "Extract the sender's email address from the message. \
             Reply with the bare address and nothing else.",
            &message,
        )
        .await?;

    let address = answer.trim().trim_matches(['<', '>', '"']).to_string();
    write_output(&output, &address).await?;

    Ok(format!("Extracted sender {} into {}", address, output.display()))
}

fn image_mime(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Read a card number out of an image with a vision completion and write the
/// digits without separators.
pub async fn extract_card_number(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, CARD_INPUT))?;
    let output = state.sandbox.resolve(&req.path_or(1, CARD_OUTPUT))?;

    let bytes = read_input_bytes(&input).await?;
    let encoded = BASE64.encode(&bytes);

    let answer = state
        .llm
        .chat_with_image(
            "The image shows a payment card. Reply with the card number digits only, no spaces.",
            image_mime(&input),
            &encoded,
        )
        .await?;

    let digits: String = answer.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(TaskError::External(anyhow!(
            "model returned no digits for {}",
            input.display()
        )));
    }

    write_output(&output, &digits).await?;

    Ok(format!("Extracted card number into {}", output.display()))
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Indices of the most cosine-similar pair among the given vectors.
pub(crate) fn most_similar_pair(vectors: &[Vec<f32>]) -> Option<(usize, usize)> {
    let mut best: Option<(f32, usize, usize)> = None;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let score = cosine_similarity(&vectors[i], &vectors[j]);
            if best.map(|(s, _, _)| score > s).unwrap_or(true) {
                best = Some((score, i, j));
            }
        }
    }
    best.map(|(_, i, j)| (i, j))
}

/// Embed every comment line and write the most similar pair, one per line.
pub async fn most_similar_comments(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, COMMENTS_INPUT))?;
    let output = state.sandbox.resolve(&req.path_or(1, COMMENTS_OUTPUT))?;

    let contents = read_input(&input).await?;
    let comments: Vec<String> = contents
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();

    if comments.len() < 2 {
        return Err(TaskError::Rejected(format!(
            "{} holds fewer than two comments",
            input.display()
        )));
    }

    info!(count = comments.len(), "embedding comments");
    let vectors = state.llm.embed(&comments).await?;

    let (i, j) = most_similar_pair(&vectors)
        .ok_or_else(|| anyhow!("no comparable pair of comments"))?;

    write_output(&output, format!("{}\n{}", comments[i], comments[j])).await?;

    Ok(format!(
        "Wrote the most similar pair of comments to {}",
        output.display()
    ))
}

/// Transcription has no speech backend behind it; the task fails cleanly
/// instead of pretending. The input is still validated so callers get the
/// right error class.
pub async fn transcribe_audio(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, "/data/audio.mp3"))?;

    if !input.exists() {
        return Err(TaskError::MissingInput(input.display().to_string()));
    }

    Err(TaskError::External(anyhow!(
        "audio transcription is not available: no speech backend is configured"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_matches_hand_computed_values() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn picks_the_closest_pair() {
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.9, 0.1, 0.0],
        ];
        assert_eq!(most_similar_pair(&vectors), Some((0, 2)));
        assert_eq!(most_similar_pair(&vectors[..1]), None);
    }

    #[test]
    fn mime_follows_the_extension() {
        use std::path::Path;
        assert_eq!(image_mime(Path::new("/data/card.jpeg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("/data/card.png")), "image/png");
    }
}

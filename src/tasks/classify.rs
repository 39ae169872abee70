use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::shared::llm::LlmClient;
use crate::tasks::TaskKind;

/// Coarse safety policy: any request that asks to delete or remove anything
/// is refused outright, before classification. No handler can delete a file,
/// so this is belt on top of the structural guarantee.
pub fn is_destructive(task: &str) -> bool {
    let lower = task.to_lowercase();
    lower.contains("delete") || lower.contains("remove")
}

struct Rule {
    kind: TaskKind,
    phrases: &'static [&'static str],
}

/// Trigger phrases per task kind. Matching is case-insensitive and scored by
/// phrase length, so the most specific phrase wins no matter where its rule
/// sits in this table; ties break by table order, which follows the task
/// codes. Classification never depends on registration order.
static RULES: &[Rule] = &[
    Rule {
        kind: TaskKind::GenerateData,
        phrases: &["datagen", "generate data", "data generation"],
    },
    Rule {
        kind: TaskKind::FormatMarkdown,
        phrases: &["prettier", "format the contents", "format the markdown"],
    },
    Rule {
        kind: TaskKind::CountWednesdays,
        phrases: &["wednesday", "wednesdays", "count the number of wednesdays"],
    },
    Rule {
        kind: TaskKind::SortContacts,
        phrases: &["sort the array of contacts", "sort contacts", "contacts"],
    },
    Rule {
        kind: TaskKind::RecentLogLines,
        phrases: &["most recent .log", "recent log", ".log file"],
    },
    Rule {
        kind: TaskKind::IndexMarkdownDocs,
        phrases: &["index of markdown", "index file", "h1 title", "docs/"],
    },
    Rule {
        kind: TaskKind::ExtractSenderEmail,
        phrases: &["sender's email", "sender email", "email address"],
    },
    Rule {
        kind: TaskKind::ExtractCardNumber,
        phrases: &["credit card", "card number"],
    },
    Rule {
        kind: TaskKind::SimilarComments,
        phrases: &["similar pair of comments", "most similar comments", "comments"],
    },
    Rule {
        kind: TaskKind::GoldTicketSales,
        phrases: &["gold ticket", "total sales of gold", "gold"],
    },
    Rule {
        kind: TaskKind::FetchUrl,
        phrases: &["fetch data from", "fetch", "download data"],
    },
    Rule {
        kind: TaskKind::CloneAndCommit,
        phrases: &["clone a git repo", "git repo", "clone", "commit"],
    },
    Rule {
        kind: TaskKind::RunSqlQuery,
        phrases: &["sql query", "run a sql", "sqlite database", "duckdb"],
    },
    Rule {
        kind: TaskKind::ScrapeLinks,
        phrases: &["scrape", "extract links", "website"],
    },
    Rule {
        kind: TaskKind::ResizeImage,
        phrases: &["resize", "compress an image", "compress the image"],
    },
    Rule {
        kind: TaskKind::TranscribeAudio,
        phrases: &["transcribe", "mp3"],
    },
    Rule {
        kind: TaskKind::MarkdownToHtml,
        phrases: &["markdown to html", "convert markdown", ".md to html"],
    },
    Rule {
        kind: TaskKind::FilterCsv,
        phrases: &["filter a csv", "filter csv", "csv file"],
    },
];

/// Single upstream classification step over the closed task set.
pub fn classify(task: &str) -> Option<TaskKind> {
    let lower = task.to_lowercase();

    let mut best: Option<(usize, TaskKind)> = None;
    for rule in RULES {
        for phrase in rule.phrases {
            if !lower.contains(phrase) {
                continue;
            }
            let score = phrase.len();
            // strictly-greater keeps the earlier rule on ties
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, rule.kind));
            }
        }
    }

    if let Some((score, kind)) = best {
        debug!(code = kind.code(), score, "keyword classification");
    }
    best.map(|(_, kind)| kind)
}

/// Fallback classifier: one completion call that must answer with a task
/// code. Used only when no keyword matched and a token is configured; any
/// failure degrades to "unrecognized" rather than failing the request.
pub async fn classify_with_llm(llm: &LlmClient, task: &str) -> Result<Option<TaskKind>> {
    let system = "You classify automation tasks. Answer with exactly one task code and \
                  nothing else, chosen from: \
                  A1 (run the data generation script), \
                  A2 (format a markdown file with prettier), \
                  A3 (count a weekday in a dates file), \
                  A4 (sort a contacts JSON array), \
                  A5 (first lines of the most recent log files), \
                  A6 (index H1 titles of markdown docs), \
                  A7 (extract the sender email address from a message), \
                  A8 (extract a credit card number from an image), \
                  A9 (find the most similar pair of comments), \
                  A10 (total sales of Gold tickets in a database), \
                  B3 (fetch data from a URL and save it), \
                  B4 (clone a git repository and make a commit), \
                  B5 (run a SQL query on a database file), \
                  B6 (scrape links from a website), \
                  B7 (resize or compress an image), \
                  B8 (transcribe an audio file), \
                  B9 (convert markdown to HTML), \
                  B10 (filter a CSV file). \
                  Answer NONE if no code applies.";

    let answer = llm.chat(system, task).await?;
    let code = answer
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_ascii_alphanumeric());

    match TaskKind::from_code(code) {
        Some(kind) => Ok(Some(kind)),
        None => {
            warn!(%answer, "LLM classifier produced no usable task code");
            Ok(None)
        }
    }
}

static DATA_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/data/[A-Za-z0-9_\-./]+").expect("valid regex"));

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s'\x22)\]]+").expect("valid regex"));

/// Lift `/data/...` path arguments out of the task text, in order of
/// appearance. Trailing punctuation from the surrounding prose is stripped.
pub fn extract_data_paths(task: &str) -> Vec<String> {
    DATA_PATH_RE
        .find_iter(task)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .collect()
}

pub fn extract_url(task: &str) -> Option<String> {
    URL_RE
        .find(task)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_destructive_tasks_any_case() {
        assert!(is_destructive("please DELETE /data/x"));
        assert!(is_destructive("Remove the old entries"));
        assert!(!is_destructive("count the wednesdays"));
    }

    #[test]
    fn classifies_core_tasks() {
        assert_eq!(
            classify("Count the number of Wednesdays in /data/dates.txt"),
            Some(TaskKind::CountWednesdays)
        );
        assert_eq!(
            classify("Sort the array of contacts in /data/contacts.json"),
            Some(TaskKind::SortContacts)
        );
        assert_eq!(
            classify("What is the total sales of Gold tickets?"),
            Some(TaskKind::GoldTicketSales)
        );
        assert_eq!(classify("entirely unrelated request"), None);
    }

    #[test]
    fn longest_phrase_wins_over_table_order() {
        // "contacts" (SortContacts) and "sort the array of contacts" both
        // match; the longer phrase belongs to the same rule here, so check a
        // genuine cross-rule overlap instead: "fetch" vs "fetch data from".
        assert_eq!(
            classify("fetch data from https://example.com/api"),
            Some(TaskKind::FetchUrl)
        );
        // "scrape" must beat the shorter "fetch" even though a URL appears
        assert_eq!(
            classify("scrape https://example.com and fetch nothing else"),
            Some(TaskKind::ScrapeLinks)
        );
    }

    #[test]
    fn extracts_paths_and_urls() {
        let paths =
            extract_data_paths("read /data/email.txt and write /data/email-sender.txt.");
        assert_eq!(paths, vec!["/data/email.txt", "/data/email-sender.txt"]);

        assert_eq!(
            extract_url("fetch https://example.com/data.json, then stop"),
            Some("https://example.com/data.json".to_string())
        );
        assert_eq!(extract_url("no url here"), None);
    }
}

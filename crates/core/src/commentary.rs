//! Commentary text helpers: prompt construction, speech cleanup, and the
//! `commentary.txt` file format.

use chrono::NaiveDateTime;

/// Rule line that brackets the commentary body in `commentary.txt`.
pub fn rule() -> String {
    "=".repeat(80)
}

/// Normalise generated commentary for speech synthesis.
///
/// Collapses all whitespace runs to single spaces, strips markdown
/// emphasis markers, and replaces em/en dashes with plain hyphens.
pub fn clean_commentary_text(commentary: &str) -> String {
    commentary
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("**", "")
        .replace('*', "")
        .replace(['\u{2014}', '\u{2013}'], "-")
}

/// User prompt asking the language model for a match summary.
pub fn build_match_prompt(year: &str, match_number: u32, match_json: &str) -> String {
    format!(
        "Here is the match data for IPL {year} Match #{match_number}:\n\n{match_json}\n\n\
         Please generate an exciting and detailed 1:30 minute cricket commentary summarizing this match."
    )
}

/// System instruction sent alongside every prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are a friendly commentary generator who gives <30 seconds \
of match summary based on the JSON file given to it as the human input. Keep your responses:\n\
- very short so that it is less than 30 seconds, technical and enthusiastic\n\
- Engaging and conversational\n\
- Helpful and concise and very short";

/// Render the on-disk `commentary.txt` contents.
pub fn render_commentary_file(
    year: &str,
    match_number: u32,
    teams: &[String],
    generated_at: NaiveDateTime,
    commentary: &str,
) -> String {
    let rule = rule();
    format!(
        "IPL {year} - Match {match_number}\nTeams: {}\nGenerated: {}\n{rule}\n\n{commentary}\n\n{rule}\n",
        teams.join(" vs "),
        generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Extract the commentary body from a `commentary.txt` file.
///
/// Files without the rule lines are returned whole.
pub fn extract_commentary(contents: &str) -> String {
    let rule = rule();
    let mut parts = contents.split(rule.as_str());
    match (parts.next(), parts.next()) {
        (Some(_), Some(body)) => body.trim().to_string(),
        _ => contents.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn cleans_markdown_and_dashes() {
        let raw = "**What a finish!**\n\n  Kohli *smashes* it \u{2014} six!\tCSK \u{2013} stunned.";
        assert_eq!(
            clean_commentary_text(raw),
            "What a finish! Kohli smashes it - six! CSK - stunned."
        );
    }

    #[test]
    fn prompt_embeds_match_json() {
        let prompt = build_match_prompt("2023", 7, "{\"teams\":[]}");
        assert!(prompt.starts_with("Here is the match data for IPL 2023 Match #7:"));
        assert!(prompt.contains("{\"teams\":[]}"));
    }

    #[test]
    fn file_format_round_trips_body() {
        let at = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        let teams = vec!["CSK".to_string(), "MI".to_string()];
        let file = render_commentary_file("2024", 3, &teams, at, "Great match.");

        assert!(file.starts_with("IPL 2024 - Match 3\nTeams: CSK vs MI\nGenerated: 2024-04-01 18:30:00\n"));
        assert_eq!(extract_commentary(&file), "Great match.");
    }

    #[test]
    fn file_without_rules_is_returned_whole() {
        assert_eq!(extract_commentary("just text"), "just text");
    }
}

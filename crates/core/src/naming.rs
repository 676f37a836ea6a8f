//! On-disk naming for highlight jobs and their artifacts.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::CoreError;

pub const MATCH_DATA_FILE: &str = "match_data.json";
pub const COMMENTARY_TEXT_FILE: &str = "commentary.txt";
pub const COMMENTARY_AUDIO_FILE: &str = "commentary.mp3";
pub const AVATAR_VIDEO_FILE: &str = "video.mp4";
/// Remote location of the rendered avatar video, see [`render_video_url_file`].
pub const VIDEO_URL_FILE: &str = "video_url.txt";
pub const SCOREBOARD_FIRST_FILE: &str = "scoreboard_inning1.png";
pub const SCOREBOARD_SECOND_FILE: &str = "scoreboard_inning2.png";
pub const FINAL_VIDEO_FILE: &str = "final_video_with_scoreboards.mp4";
pub const ASSEMBLY_WORK_DIR: &str = "temp_video_processing";

/// Team placeholder used when match data carries no team list.
pub const UNKNOWN_TEAM: &str = "Unknown";

/// Highlight job identifier: `"{year}_{match_number}"`.
pub fn job_id(year: &str, match_number: u32) -> String {
    format!("{year}_{match_number}")
}

/// Split a job id back into `(year, match_number)`.
pub fn parse_job_id(job_id: &str) -> Result<(String, u32), CoreError> {
    let (year, number) = job_id
        .split_once('_')
        .ok_or_else(|| CoreError::Validation(format!("Invalid job id '{job_id}'")))?;
    validate_year(year)?;
    let number = number
        .parse::<u32>()
        .map_err(|_| CoreError::Validation(format!("Invalid match number in job id '{job_id}'")))?;
    Ok((year.to_string(), number))
}

/// Years are four ASCII digits. This also keeps them safe to use in paths.
pub fn validate_year(year: &str) -> Result<(), CoreError> {
    if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Year must be four digits, got '{year}'"
        )))
    }
}

/// Folder holding every artifact for one match:
/// `{root}/{year}/match_{n}_{A}_vs_{B}`.
pub fn match_folder(root: &Path, year: &str, match_number: u32, teams: &[String]) -> PathBuf {
    let team_part = if teams.is_empty() {
        format!("{UNKNOWN_TEAM}_vs_{UNKNOWN_TEAM}")
    } else {
        teams
            .iter()
            .map(|t| sanitize_component(t))
            .collect::<Vec<_>>()
            .join("_vs_")
    };
    root.join(year)
        .join(format!("match_{match_number}_{team_part}"))
}

/// Replace path separators and other awkward characters in a team name.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Human-readable title, e.g. `"IPL 2024 - Match 3 - CSK vs MI"`.
pub fn video_title(year: &str, match_number: u32, teams: &[String]) -> String {
    format!("IPL {year} - Match {match_number} - {}", teams.join(" vs "))
}

const VIDEO_URL_PREFIX: &str = "Video URL:";

/// Contents of `video_url.txt`:
///
/// ```text
/// Video URL: https://...
/// Generated: 2024-05-01 12:00:05
/// ```
pub fn render_video_url_file(video_url: &str, generated_at: NaiveDateTime) -> String {
    format!(
        "{VIDEO_URL_PREFIX} {video_url}\nGenerated: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Read the URL back out of `video_url.txt`. A file holding only a bare
/// URL is accepted as-is.
pub fn parse_video_url_file(contents: &str) -> Option<String> {
    let url = contents
        .lines()
        .find_map(|line| line.strip_prefix(VIDEO_URL_PREFIX))
        .or_else(|| contents.lines().next())?
        .trim();
    (!url.is_empty()).then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn video_url_file_reads_back() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 5)
            .unwrap();
        let file = render_video_url_file("https://video/V1.mp4", at);
        assert_eq!(file, "Video URL: https://video/V1.mp4\nGenerated: 2024-05-01 12:00:05\n");
        assert_eq!(parse_video_url_file(&file).as_deref(), Some("https://video/V1.mp4"));
    }

    #[test]
    fn bare_or_empty_video_url_file() {
        assert_eq!(
            parse_video_url_file("https://video/V1.mp4\n").as_deref(),
            Some("https://video/V1.mp4")
        );
        assert_eq!(parse_video_url_file(""), None);
        assert_eq!(parse_video_url_file("Video URL:   \n"), None);
    }

    fn teams(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn job_id_round_trips() {
        let id = job_id("2024", 12);
        assert_eq!(id, "2024_12");
        assert_eq!(parse_job_id(&id).unwrap(), ("2024".to_string(), 12));
    }

    #[test]
    fn malformed_job_ids_are_rejected() {
        assert!(parse_job_id("2024").is_err());
        assert!(parse_job_id("../x_1").is_err());
        assert!(parse_job_id("2024_abc").is_err());
    }

    #[test]
    fn folder_layout() {
        let folder = match_folder(Path::new("commentaries"), "2024", 3, &teams(&["CSK", "MI"]));
        assert_eq!(folder, PathBuf::from("commentaries/2024/match_3_CSK_vs_MI"));
    }

    #[test]
    fn missing_teams_use_placeholder() {
        let folder = match_folder(Path::new("out"), "2023", 1, &[]);
        assert!(folder.ends_with("match_1_Unknown_vs_Unknown"));
    }

    #[test]
    fn separators_in_team_names_are_replaced() {
        let folder = match_folder(Path::new("out"), "2023", 1, &teams(&["A/B", "C"]));
        assert!(folder.ends_with("match_1_A_B_vs_C"));
    }

    #[test]
    fn title_joins_teams() {
        assert_eq!(
            video_title("2024", 3, &teams(&["CSK", "MI"])),
            "IPL 2024 - Match 3 - CSK vs MI"
        );
    }
}

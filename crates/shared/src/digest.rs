use chrono::NaiveDate;

use crate::ranker::ScoredPaper;

const EMPTY_MESSAGE: &str = "No Papers Today. Take a Rest!";

/// Relevance as `(full, half)` stars: none up to 6, five from 8, half-star
/// steps in between.
pub fn star_rating(score: f32) -> (usize, usize) {
    let (low, high) = (6.0_f32, 8.0_f32);
    if score.is_nan() || score <= low {
        return (0, 0);
    }
    if score >= high {
        return (5, 0);
    }
    let steps = ((score - low) * 10.0 / (high - low)).ceil() as usize;
    (steps / 2, steps % 2)
}

/// `A, B, C, D, E` for up to five authors, otherwise `A, B, C, ..., Y, Z`.
pub fn format_authors(authors: &[String]) -> String {
    if authors.len() <= 5 {
        return authors.join(", ");
    }
    let mut shown: Vec<&str> = authors[..3].iter().map(String::as_str).collect();
    shown.push("...");
    shown.extend(authors[authors.len() - 2..].iter().map(String::as_str));
    shown.join(", ")
}

pub struct DigestRenderer;

impl DigestRenderer {
    pub fn subject(date: NaiveDate) -> String {
        format!("Daily arXiv {}", date.format("%Y/%m/%d"))
    }

    pub fn render_html(papers: &[ScoredPaper], date: NaiveDate) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "  <title>{}</title>\n",
            Self::escape_html(&Self::subject(date))
        ));
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; max-width: 800px; margin: 40px auto; padding: 0 20px; line-height: 1.5; }\n");
        html.push_str("    h1 { color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; text-align: center; }\n");
        html.push_str("    .paper { margin: 20px 0; padding: 16px; background-color: #f8f9fa; border: 1px solid #ddd; border-radius: 8px; }\n");
        html.push_str("    .title { font-size: 20px; font-weight: bold; color: #333; }\n");
        html.push_str("    .authors { font-size: 14px; color: #666; margin: 8px 0; }\n");
        html.push_str("    .relevance { font-size: 14px; color: #333; margin: 8px 0; }\n");
        html.push_str("    .full-star { font-size: 15px; color: #f4b400; }\n");
        html.push_str("    .half-star { font-size: 15px; color: #f4b400; display: inline-block; width: 50%; overflow: hidden; vertical-align: top; }\n");
        html.push_str("    .tldr { font-size: 14px; color: #333; margin: 8px 0; }\n");
        html.push_str("    .link { display: inline-block; padding: 6px 12px; margin-right: 8px; color: #fff; background-color: #3498db; text-decoration: none; border-radius: 4px; font-size: 14px; }\n");
        html.push_str("    .empty { text-align: center; color: #7f8c8d; font-size: 20px; margin: 60px 0; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str(&format!(
            "<h1>{}</h1>\n",
            Self::escape_html(&Self::subject(date))
        ));

        if papers.is_empty() {
            html.push_str(&format!("<p class=\"empty\">{}</p>\n", EMPTY_MESSAGE));
        }

        for scored in papers {
            let paper = &scored.paper;
            html.push_str("<div class=\"paper\">\n");
            html.push_str(&format!(
                "  <div class=\"title\">{}</div>\n",
                Self::escape_html(&paper.title)
            ));
            html.push_str(&format!(
                "  <div class=\"authors\">{}</div>\n",
                Self::escape_html(&format_authors(&paper.authors))
            ));

            let (full, half) = star_rating(scored.score);
            html.push_str("  <div class=\"relevance\"><strong>Relevance:</strong> ");
            for _ in 0..full {
                html.push_str("<span class=\"full-star\">⭐</span>");
            }
            for _ in 0..half {
                html.push_str("<span class=\"half-star\">⭐</span>");
            }
            html.push_str(&format!(" ({:.2})</div>\n", scored.score));

            html.push_str(&format!(
                "  <div class=\"relevance\"><strong>arXiv ID:</strong> <a href=\"{}\">{}</a></div>\n",
                Self::escape_html(&paper.abs_url),
                Self::escape_html(&paper.arxiv_id)
            ));

            match &scored.tldr {
                Some(tldr) => html.push_str(&format!(
                    "  <div class=\"tldr\"><strong>TLDR:</strong> {}</div>\n",
                    Self::escape_html(tldr)
                )),
                None => html.push_str(&format!(
                    "  <div class=\"tldr\"><strong>Abstract:</strong> {}</div>\n",
                    Self::escape_html(&paper.summary)
                )),
            }

            html.push_str(&format!(
                "  <div><a href=\"{}\" class=\"link\">PDF</a><a href=\"{}\" class=\"link\">arXiv</a></div>\n",
                Self::escape_html(&paper.pdf_url),
                Self::escape_html(&paper.abs_url)
            ));
            html.push_str("</div>\n");
        }

        html.push_str("</body>\n</html>");
        html
    }

    pub fn render_text(papers: &[ScoredPaper], date: NaiveDate) -> String {
        let mut text = format!("{}\n\n", Self::subject(date));

        if papers.is_empty() {
            text.push_str(EMPTY_MESSAGE);
            text.push('\n');
            return text;
        }

        for (index, scored) in papers.iter().enumerate() {
            let paper = &scored.paper;
            text.push_str(&format!("{}. {}\n", index + 1, paper.title));
            text.push_str(&format!("   {}\n", format_authors(&paper.authors)));
            text.push_str(&format!("   Relevance: {:.2}\n", scored.score));
            if let Some(tldr) = &scored.tldr {
                text.push_str(&format!("   TLDR: {}\n", tldr));
            }
            text.push_str(&format!("   {}\n   {}\n\n", paper.abs_url, paper.pdf_url));
        }

        text
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arxiv::ArxivPaper;

    fn scored(title: &str, score: f32, tldr: Option<&str>) -> ScoredPaper {
        ScoredPaper {
            paper: ArxivPaper {
                arxiv_id: "2401.00001".to_string(),
                title: title.to_string(),
                summary: "An abstract.".to_string(),
                authors: vec!["Ada Lovelace".to_string()],
                categories: vec!["cs.AI".to_string()],
                published: None,
                abs_url: "https://arxiv.org/abs/2401.00001".to_string(),
                pdf_url: "https://arxiv.org/pdf/2401.00001".to_string(),
            },
            score,
            tldr: tldr.map(String::from),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    #[test]
    fn stars_follow_thresholds() {
        assert_eq!(star_rating(5.0), (0, 0));
        assert_eq!(star_rating(6.0), (0, 0));
        assert_eq!(star_rating(6.1), (0, 1));
        assert_eq!(star_rating(7.0), (2, 1));
        assert_eq!(star_rating(8.0), (5, 0));
        assert_eq!(star_rating(9.5), (5, 0));
    }

    #[test]
    fn long_author_lists_are_elided() {
        let authors: Vec<String> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(format_authors(&authors), "A, B, C, ..., E, F");
        assert_eq!(format_authors(&authors[..5]), "A, B, C, D, E");
    }

    #[test]
    fn subject_uses_processing_date() {
        assert_eq!(DigestRenderer::subject(date()), "Daily arXiv 2024/01/05");
    }

    #[test]
    fn empty_digest_says_so() {
        let html = DigestRenderer::render_html(&[], date());
        assert!(html.contains(EMPTY_MESSAGE));
        assert!(DigestRenderer::render_text(&[], date()).contains(EMPTY_MESSAGE));
    }

    #[test]
    fn html_is_escaped_and_prefers_tldr() {
        let papers = [scored("A <b> & C", 8.5, Some("Short."))];
        let html = DigestRenderer::render_html(&papers, date());
        assert!(html.contains("A &lt;b&gt; &amp; C"));
        assert!(html.contains("TLDR:</strong> Short."));
        assert!(!html.contains("An abstract."));
        assert_eq!(html.matches("class=\"full-star\"").count(), 5);
    }

    #[test]
    fn abstract_shown_without_tldr() {
        let html = DigestRenderer::render_html(&[scored("T", 1.0, None)], date());
        assert!(html.contains("Abstract:</strong> An abstract."));
        let text = DigestRenderer::render_text(&[scored("T", 1.0, None)], date());
        assert!(text.starts_with("Daily arXiv 2024/01/05"));
        assert!(text.contains("1. T"));
    }
}

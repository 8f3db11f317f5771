//! Prompts for the paper summariser.
//!
//! The summary prompt and the label parser in [`crate::summary`] are two
//! halves of one contract: the prompt asks for five lines, each starting
//! with a fixed Japanese label, and the parser looks for exactly those
//! labels. Both sides import the labels from here.
//!
//! Callers can override the prompt via [`crate::config::LlmConfig::system_prompt`];
//! an override must keep the labels or every field comes back as `N/A`.

/// Label of the translated title line.
pub const LABEL_TITLE: &str = "論文名";
/// Label of the keywords line.
pub const LABEL_KEYWORDS: &str = "キーワード";
/// Label of the problem line.
pub const LABEL_PROBLEM: &str = "課題";
/// Label of the method line.
pub const LABEL_METHOD: &str = "手法";
/// Label of the result line.
pub const LABEL_RESULT: &str = "結果";

/// Default system prompt: summarise a paper into five labelled Japanese lines.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"与えられた論文の要点をまとめ、以下の項目で日本語で出力せよ。それぞれの項目は最大でも180文字以内に要約せよ。
```
論文名:タイトルの日本語訳
キーワード:この論文のキーワード
課題:この論文が解決する課題
手法:この論文が提案する手法
結果:提案手法によって得られた結果
```"#;

/// Build the user message carrying the paper's title and abstract excerpt.
pub fn paper_message(title: &str, abstract_text: &str) -> String {
    format!("title: {title}\nbody: {abstract_text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_every_label() {
        for label in [
            LABEL_TITLE,
            LABEL_KEYWORDS,
            LABEL_PROBLEM,
            LABEL_METHOD,
            LABEL_RESULT,
        ] {
            assert!(
                DEFAULT_SUMMARY_PROMPT.contains(&format!("{label}:")),
                "prompt lacks label {label}"
            );
        }
    }

    #[test]
    fn paper_message_layout() {
        let m = paper_message("Attention Is All You Need", "We propose...");
        assert_eq!(m, "title: Attention Is All You Need\nbody: We propose...");
    }
}

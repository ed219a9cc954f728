const TITLE_LABEL: &str = "**Original Title:** ";
const CONTENT_OPEN: &str = "**Original Content:**\n\"\"\"\n";
const CONTENT_END: &str = "\n\"\"\"\n\n";
const CONTENT_CLOSE: &str = "\n\"\"\"\n\n**Instructions:**";

const INSTRUCTIONS: &str = r#"**Instructions:**
1. Improve the writing style to be more professional, engaging, and clear.
2. Fix any grammar or spelling errors.
3. Organize the content with proper markdown headings, bullet points, and paragraphs.
4. Extrapolate on the key points to add depth, but keep the core message intact.
5. Analyze the sentiment, tone, and readability of the enhanced article.
6. Extract 5-10 relevant SEO keywords.

**Output Format:**
You must output a VALID JSON object with exactly this structure:
{
  "enhancedContent": "The full enhanced article in markdown format...",
  "analytics": {
    "sentiment": "Positive" | "Neutral" | "Negative",
    "tone": "Professional/Casual/Enthusiastic/Informative",
    "readabilityScore": <integer from 0 to 100>,
    "keywords": ["keyword1", "keyword2", "..."]
  }
}

Return ONLY the JSON object. Do not wrap it in markdown code fences and do not add any text before or after it."#;

/// Build the enhancement prompt for one article. The title and content are
/// embedded verbatim, so equal inputs always give equal prompts.
pub fn build_enhancement_prompt(title: &str, content: &str) -> String {
    let mut prompt = String::with_capacity(content.len() + INSTRUCTIONS.len() + 256);
    prompt.push_str("Act as a professional content editor and SEO specialist.\n");
    prompt.push_str("Your task is to ENHANCE the following article content.\n\n");
    prompt.push_str(TITLE_LABEL);
    prompt.push_str(title);
    prompt.push('\n');
    prompt.push_str(CONTENT_OPEN);
    prompt.push_str(content);
    prompt.push_str(CONTENT_END);
    prompt.push_str(INSTRUCTIONS);
    prompt
}

/// Recover `(title, content)` from a prompt built by [`build_enhancement_prompt`].
pub(crate) fn extract_source(prompt: &str) -> Option<(&str, &str)> {
    let title_start = prompt.find(TITLE_LABEL)? + TITLE_LABEL.len();
    let title_end = title_start + prompt[title_start..].find('\n')?;
    let content_start = prompt.find(CONTENT_OPEN)? + CONTENT_OPEN.len();
    let content_end = prompt.rfind(CONTENT_CLOSE)?;
    if content_end < content_start {
        return None;
    }
    Some((&prompt[title_start..title_end], &prompt[content_start..content_end]))
}

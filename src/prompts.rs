//! Seed prompt and suggested style tags.

/// Prompt a fresh session starts with.
pub const DEFAULT_PROMPT: &str = "convert this image into studio ghibli style anime";

/// Style tags offered next to the prompt box.
pub const PROMPT_TAGS: [&str; 20] = [
    "studio ghibli style",
    "photorealistic",
    "iphone selfie",
    "cartoon line drawing",
    "naruto style",
    "film photo",
    "90s film",
    "michelangelo painting",
    "watercolor",
    "pixel art",
    "cyberpunk",
    "vaporwave",
    "oil painting",
    "pencil sketch",
    "ukiyo-e",
    "pop art",
    "impressionist",
    "low poly",
    "isometric",
    "retro game",
];

/// Appends `tag` to `prompt`, separated by a single space.
pub fn append_tag(prompt: &str, tag: &str) -> String {
    if prompt.is_empty() || prompt.ends_with(' ') {
        format!("{prompt}{tag}")
    } else {
        format!("{prompt} {tag}")
    }
}

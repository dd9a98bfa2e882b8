const FENCE: &str = "```";

/// Recover the candidate JSON text from a raw model response.
///
/// 1. Fenced block: the text between the first fence and the next one (or the
///    end if it never closes). A first line with no `{` or `[` is the
///    language tag and is dropped.
/// 2. Otherwise the span from the first `{` to the last `}`.
/// 3. Otherwise the whole text.
///
/// Never fails; an empty result is the caller's problem.
pub fn extract_json_payload(response: &str) -> &str {
    if let Some(start) = response.find(FENCE) {
        let after_fence = &response[start + FENCE.len()..];
        let block = match after_fence.find(FENCE) {
            Some(end) => &after_fence[..end],
            None => after_fence,
        };
        let body = match block.split_once('\n') {
            Some((tag, rest)) if !tag.contains(['{', '[']) => rest,
            _ => block,
        };
        return body.trim();
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            return &response[start..=end];
        }
    }

    response
}

use crate::models::CpraRequest;

/// Responsiveness instructions. The element count appears several times
/// because small local models drift on array length otherwise.
pub fn build_responsiveness_system_prompt(request_count: usize) -> String {
    let n = request_count;
    let example_responsive = vec!["true"; n].join(", ");
    let example_confidence = vec!["\"high\""; n].join(", ");
    let example_reasoning = vec!["\"The email directly discusses this topic\""; n].join(", ");

    format!(
        r#"You are an expert legal assistant specializing in California Public Records Act (CPRA) requests.
Your task is to determine if an email document is responsive to specific CPRA requests.

RESPONSIVENESS CRITERIA:
- A document is "responsive" if it contains information that relates to, discusses, or provides evidence about the subject matter of the CPRA request
- Consider both direct mentions and indirect relevance
- Even partial relevance should be considered responsive
- When in doubt, err on the side of finding documents responsive

CONFIDENCE LEVELS:
- "high": Clear, direct relevance to the request
- "medium": Indirect or partial relevance to the request
- "low": Minimal or questionable relevance to the request

IMPORTANT INSTRUCTIONS:
- Analyze the ENTIRE email as a whole document
- Provide ONE single assessment for EACH CPRA request
- Do NOT analyze individual paragraphs or sections separately
- Your arrays must have EXACTLY {n} element(s) - one per CPRA request

You must respond with valid JSON only, using this exact format:
{{
    "responsive": [true/false for each request],
    "confidence": ["high"/"medium"/"low" for each request],
    "reasoning": ["brief explanation for each request"]
}}

Example for {n} request(s):
{{
    "responsive": [{example_responsive}],
    "confidence": [{example_confidence}],
    "reasoning": [{example_reasoning}]
}}

CRITICAL: Each array must contain EXACTLY {n} element(s) - one element per CPRA request."#
    )
}

/// User block: numbered requests followed by the email body.
pub fn build_responsiveness_user_prompt(email_text: &str, requests: &[CpraRequest]) -> String {
    let n = requests.len();
    let requests_text = requests
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Request {}: {}", i + 1, r.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze this email for responsiveness to the following CPRA request(s):

CPRA REQUEST(S) TO ANALYZE:
{requests_text}

EMAIL DOCUMENT TO ANALYZE:
{email_text}

REMEMBER: Provide ONE assessment per CPRA request. Your JSON response must have exactly {n} element(s) in each array.
Analyze the email as a WHOLE DOCUMENT, not paragraph by paragraph."#
    )
}

pub const EXEMPTION_SYSTEM_PROMPT: &str = r#"You are an expert legal assistant specializing in California Public Records Act (CPRA) exemptions.
Your task is to identify potential exemptions that may apply to email content.

EXEMPTION DEFINITIONS:

1. ATTORNEY-CLIENT PRIVILEGE:
   - Communications between attorney and client for legal advice
   - Legal strategy discussions
   - Attorney work product or legal analysis
   - Must involve actual attorney-client relationship

2. PERSONNEL RECORDS:
   - Employee performance evaluations or reviews
   - Disciplinary actions or investigations
   - Personal employee information (medical, financial, private matters)
   - HR-related confidential discussions about specific individuals

3. DELIBERATIVE PROCESS:
   - Pre-decisional discussions and recommendations
   - Draft documents not yet finalized
   - Internal policy discussions before final decisions
   - Advisory opinions or preliminary analysis

CONFIDENCE LEVELS:
- "high": Clear, definitive indicators of exemption
- "medium": Probable exemption with some indicators
- "low": Possible exemption but uncertain

You must respond with valid JSON only, using this exact format:
{
    "exemptions": {
        "attorney_client": {"applies": true/false, "confidence": "high/medium/low", "reasoning": "brief explanation"},
        "personnel": {"applies": true/false, "confidence": "high/medium/low", "reasoning": "brief explanation"},
        "deliberative": {"applies": true/false, "confidence": "high/medium/low", "reasoning": "brief explanation"}
    }
}

CRITICAL: Your response must be valid JSON with exactly the structure shown above."#;

pub fn build_exemption_user_prompt(email_text: &str) -> String {
    format!(
        r#"Analyze this email for potential CPRA exemptions:

EMAIL DOCUMENT TO ANALYZE:
{email_text}

Provide your analysis in the required JSON format."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_states_element_count() {
        let prompt = build_responsiveness_system_prompt(3);
        assert!(prompt.contains("EXACTLY 3 element(s)"));
        assert!(prompt.contains("\"responsive\": [true, true, true]"));
        assert!(prompt.contains("\"confidence\": [\"high\", \"high\", \"high\"]"));
    }

    #[test]
    fn user_prompt_numbers_requests_from_one() {
        let requests = vec![
            CpraRequest::new("roof leak documents"),
            CpraRequest::new("change order #3 documents"),
        ];
        let prompt = build_responsiveness_user_prompt("Email body here", &requests);
        assert!(prompt.contains("Request 1: roof leak documents\nRequest 2: change order #3 documents"));
        assert!(prompt.contains("Email body here"));
        assert!(prompt.contains("exactly 2 element(s)"));
    }

    #[test]
    fn exemption_prompt_names_every_category() {
        for category in crate::models::ExemptionCategory::all() {
            assert!(EXEMPTION_SYSTEM_PROMPT.contains(&format!("\"{}\"", category.as_str())));
        }
    }

    #[test]
    fn exemption_user_prompt_embeds_email() {
        let prompt = build_exemption_user_prompt("From: counsel@city.gov");
        assert!(prompt.contains("From: counsel@city.gov"));
    }
}

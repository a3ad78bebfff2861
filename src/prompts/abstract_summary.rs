//! Abstract summarization prompts.
//!
//! Summaries are written in Korean; medical, anatomical, device and drug
//! names stay in English.

/// System prompt for medical abstract summarization
pub const SYSTEM_PROMPT: &str = "당신은 의학 논문 초록을 요약하는 전문가입니다. \
한국어로 간결하고 정확하게 요약해주세요. 중요한 연구 결과와 임상적 의의를 포함해주세요. \
의학용어, 해부학용어, 의료기기명, 약품명은 영어 그대로 유지하고 한글로 번역하지 마세요.";

/// User prompt template for a single abstract
/// Placeholders: {abstract_text}
pub const USER_PROMPT_TEMPLATE: &str = "다음 의학 논문 초록을 한국어로 3-4문장으로 간결하게 요약해주세요. \
주요 연구 목적, 방법, 결과, 결론을 포함하고, 의학용어, 해부학용어, 의료기기명, 약품명은 영어 그대로 유지해주세요:

\"{abstract_text}\"";

/// Build user prompt with the preprocessed abstract
pub fn build_user_prompt(abstract_text: &str) -> String {
    USER_PROMPT_TEMPLATE.replace("{abstract_text}", abstract_text)
}

//! Keyword routing between the chat and record agents.

const RECORD_KEYWORDS: &[&str] = &[
    "record",
    "medical history",
    "health records",
    "vitals",
    "prescription",
    "medication",
    "report",
    "summary",
    "lab result",
    "diagnosis",
    "treatment",
];

const VITALS_KEYWORDS: &[&str] = &["vital", "blood pressure", "heart rate"];
const PRESCRIPTION_KEYWORDS: &[&str] = &["prescription", "medication"];
const SUMMARY_KEYWORDS: &[&str] = &["summary", "overview", "complete record"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    Vitals,
    Prescriptions,
    Summary,
}

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Pick the agent for a free-text message. Record routes need a patient.
pub fn classify_query(message: &str, has_patient: bool) -> Route {
    let text = message.to_lowercase();
    if !has_patient || !mentions(&text, RECORD_KEYWORDS) {
        return Route::Chat;
    }
    if mentions(&text, VITALS_KEYWORDS) {
        Route::Vitals
    } else if mentions(&text, PRESCRIPTION_KEYWORDS) {
        Route::Prescriptions
    } else if mentions(&text, SUMMARY_KEYWORDS) {
        Route::Summary
    } else {
        Route::Chat
    }
}

//! System prompts and curated vocabularies for the LLM gateway.

/// Closed catalog of functional labels. Extraction is constrained to these;
/// anything else the model invents is dropped.
pub const LABEL_CATALOG: &[&str] = &[
    "Accounting",
    "Analytics",
    "Banking",
    "CRM",
    "Communication",
    "Compliance",
    "Customer Support",
    "Data Management",
    "Debt Collection",
    "Document Management",
    "E-commerce",
    "Email Marketing",
    "Financial Planning",
    "HR & Payroll",
    "Invoicing",
    "Inventory Management",
    "Legal Services",
    "Liquidity Management",
    "Marketing Automation",
    "Multi-Banking",
    "Online Payments",
    "Point of Sale",
    "Project Management",
    "Reporting",
    "Sales",
    "Shipping & Logistics",
    "Tax Management",
    "Time Tracking",
    "Workflow Automation",
];

/// Example pool for clarifying questions about integrations.
pub const INTEGRATION_EXAMPLES: &[&str] = &[
    "Stripe",
    "DATEV",
    "Shopify",
    "Zapier",
    "PayPal",
    "Twint",
    "bexio",
    "HubSpot",
    "Google Workspace",
    "Slack",
];

/// Example pool for clarifying questions about business-context tags.
pub const TAG_EXAMPLES: &[&str] = &[
    "SME",
    "B2B",
    "E-commerce",
    "Switzerland",
    "Automation",
    "Startup",
    "Retail",
    "Consulting",
    "Healthcare",
    "Manufacturing",
];

pub const TRANSLATION_SYSTEM_PROMPT: &str = "\
You are a professional translator. Translate the user's text to English.

Rules:
- If the text is already in English, return it as-is
- Preserve technical terms, product names, and brand names
- Keep the meaning and intent intact
- Return ONLY the translated text, no explanations";

pub const EXTRACTION_SYSTEM_PROMPT: &str = "\
You are a business application requirements extractor. Extract structured \
data from the user's English description.

CRITICAL RULES:
1. Return ONLY valid JSON. No markdown, no explanations.
2. Extract only what is clearly stated in the text.
3. Use proper capitalization for all extracted values.
4. Never duplicate items.

OUTPUT STRUCTURE:
{
  \"labels\": [\"label1\", \"label2\"],
  \"tags\": [\"tag1\", \"tag2\"],
  \"integrations\": [\"Integration1\", \"Integration2\"],
  \"price_max\": number or null
}

FIELD DEFINITIONS:
- labels: Business function labels. Choose ONLY from the allowed catalog provided.
- tags: Short descriptive tags (e.g., \"SME\", \"Automation\", \"Switzerland\"). Free-form strings.
- integrations: External platform/service names (e.g., \"Stripe\", \"Shopify\", \"DATEV\"). Free-form strings, Title Case.
- price_max: Maximum price the user will pay, as a plain number. Use 0 when the user wants it free. Use null when no budget is stated.

EXTRACTION GUIDELINES:
- labels: Must exist in the provided catalog. Extract up to 10 most relevant.
- tags: Extract 1-10 relevant tags. Keep them concise (1-3 words).
- integrations: Extract mentioned integrations verbatim, normalized capitalization. Max 10.
- price_max: Only when a cash ceiling is explicitly stated (\"budget of 50 CHF\" -> 50, \"must be free\" -> 0).
- If nothing found for a category, use an empty array or null.";

pub const QUESTION_SYSTEM_PROMPT: &str = "\
You are an assistant helping to clarify business software requirements.

Your task: Generate ONE targeted question to help the user specify missing information.

Rules:
- Ask in English, concise and direct
- Make the question natural and conversational
- Weave the provided example values into the question
- Don't ask multiple questions at once
- Output ONLY valid JSON: {\"question\": \"your question here\"}";

pub const CARD_FIELDS_SYSTEM_PROMPT: &str = "\
You are a technical product manager creating backlog cards. Your task is to \
generate a concise title and description for a feature request card.

CRITICAL RULES:
1. Output ONLY valid JSON. No markdown, no explanations, no extra text.
2. Title MUST be under 10 words (strict limit).
3. Description MUST be under 600 words (strict limit).
4. Always output in English, regardless of input language.
5. Title should be clear, actionable, and specific.
6. Description should capture the core requirement, user need, and any important context.

OUTPUT FORMAT:
{
  \"title\": \"string (max 10 words)\",
  \"description\": \"string (max 600 words)\"
}";

/// Format the user message for requirement extraction. The prior accumulated
/// values are listed so the model focuses on what the newest turn adds.
pub fn extraction_user_prompt(english_text: &str, prior: Option<&crate::types::Accumulated>) -> String {
    let catalog = LABEL_CATALOG
        .iter()
        .map(|l| format!("\"{l}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "Extract structured data from this business application requirement:\n\n\
         ALLOWED LABELS (choose ONLY from these):\n[{catalog}]\n\n\
         EXAMPLE TAGS (choose from these or create similar ones):\n{:?}\n\n",
        TAG_EXAMPLES
    );

    if let Some(prior) = prior {
        prompt.push_str(&format!(
            "ALREADY CAPTURED (do not repeat, extract only new information):\n\
             labels: {:?}\ntags: {:?}\nintegrations: {:?}\n\n",
            prior.labels, prior.tags, prior.integrations
        ));
    }

    prompt.push_str(&format!(
        "USER TEXT:\n{english_text}\n\n\
         Return ONLY the JSON object with labels, tags, integrations, and price_max."
    ));
    prompt
}

/// Format the user message for card field generation.
pub fn card_fields_user_prompt(english_prompt: &str) -> String {
    format!("Generate a title and description for this feature request:\n\nREQUEST:\n{english_prompt}\n\nOutput the JSON now:")
}

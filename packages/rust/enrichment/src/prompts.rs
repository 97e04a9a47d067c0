//! Prompt builders. Every prompt demands bare JSON output.

use sitesense_shared::{ExtractedDocument, FaqRecord, ProductRecord};

/// Page text sent to the model is cut to this many characters.
const PROMPT_TEXT_CHARS: usize = 12_000;

pub(crate) const JSON_ONLY_SYSTEM: &str = "You are a precise assistant that analyzes website \
     content. Respond with valid JSON only. Do not wrap it in markdown or add commentary.";

pub(crate) fn faqs(doc: &ExtractedDocument, count: usize) -> String {
    format!(
        "Generate {count} frequently asked questions a visitor of this website might ask, \
         answered strictly from the content below.\n\n\
         Return a JSON array of objects with keys \"question\", \"answer\", \
         \"category\" (short label), and \"confidence\" (0 to 1).\n\n\
         Title: {title}\nURL: {url}\n\nContent:\n{content}",
        title = doc.title,
        url = doc.url,
        content = truncate_content(doc.body_text(), PROMPT_TEXT_CHARS),
    )
}

pub(crate) fn analysis(doc: &ExtractedDocument) -> String {
    format!(
        "Analyze the following web page.\n\n\
         Return a JSON object with keys \"summary\" (2-3 sentences), \"keywords\" \
         (array, up to 10), \"categories\" (array), \"topics\" (array), \"sentiment\" \
         (\"positive\", \"neutral\", or \"negative\"), and \"language\" (ISO 639-1 code).\n\n\
         Title: {title}\nDescription: {description}\n\nContent:\n{content}",
        title = doc.title,
        description = doc.description,
        content = truncate_content(doc.body_text(), PROMPT_TEXT_CHARS),
    )
}

pub(crate) fn product_batch(products: &[ProductRecord], context: &str) -> String {
    let mut listing = String::new();
    for (i, p) in products.iter().enumerate() {
        listing.push_str(&format!("{i}. {}", p.name));
        if let Some(price) = p.price {
            listing.push_str(&format!(" | price: {price} {}", p.currency.as_deref().unwrap_or("")));
        }
        if let Some(category) = &p.category {
            listing.push_str(&format!(" | category: {category}"));
        }
        if let Some(description) = &p.description {
            listing.push_str(&format!(" | description: {description}"));
        }
        if !p.features.is_empty() {
            listing.push_str(&format!(" | features: {}", p.features.join(", ")));
        }
        listing.push('\n');
    }

    format!(
        "Write an appealing, factual product description and suggest search keywords for \
         each product below.\n\n\
         Return a JSON array with one object per product: \"index\" (the number shown), \
         \"generatedDescription\" (1-2 sentences), and \"suggestedKeywords\" (array of 3-6).\n\n\
         Store context: {context}\n\nProducts:\n{listing}"
    )
}

pub(crate) fn key_info(doc: &ExtractedDocument) -> String {
    format!(
        "Extract key business information from this web page. Use null for anything not \
         stated; do not guess.\n\n\
         Return a JSON object with keys \"companyName\", \"description\", \"contact\" \
         (object with \"email\", \"phone\", \"address\"), \"businessHours\", \"socialLinks\" \
         (object mapping platform name to URL), and \"services\" (array).\n\n\
         Title: {title}\nURL: {url}\n\nContent:\n{content}",
        title = doc.title,
        url = doc.url,
        content = truncate_content(&doc.raw_text, PROMPT_TEXT_CHARS),
    )
}

pub(crate) fn question_variants(doc: &ExtractedDocument, faq: &FaqRecord) -> String {
    format!(
        "Rewrite this customer question about \"{site}\" in 3 to 5 different ways a real \
         person might ask it. Keep the meaning identical.\n\n\
         Return a JSON array of strings.\n\nQuestion: {question}",
        site = doc.title,
        question = faq.question
    )
}

/// Cut `content` to `max_chars`, appending a marker when truncated.
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((byte_idx, _)) => {
            let truncated = &content[..byte_idx];
            format!("{truncated}\n\n[... content truncated for LLM context window ...]")
        }
    }
}

//! Product detection.
//!
//! Structured data wins: JSON-LD `Product` nodes first, then schema.org
//! microdata. Only when neither yields anything do we fall back to scanning
//! the DOM for product cards and "add to cart" affordances.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use sitesense_shared::ProductRecord;

use crate::links::resolve_href;
use crate::price::{Price, currency_code, find_price, parse_price};
use crate::text::element_text;

/// Upper bound on products reported for one page.
const MAX_PRODUCTS: usize = 50;

/// Levels walked up from a cart button looking for its product container.
const MAX_ANCESTOR_HOPS: usize = 6;

const CARD_SELECTORS: &str = ".product, .product-item, .product-card, .product-tile, \
     li.item, [data-product-id], [data-product]";

const NAME_SELECTORS: &str = ".product-title, .product-name, .product__title, \
     [class*=\"product-title\"], [class*=\"product-name\"], h1, h2, h3, h4";

const CART_PHRASES: &[&str] = &[
    "add to cart",
    "add to bag",
    "add to basket",
    "buy now",
    "カートに入れる",
    "カートに追加",
    "購入する",
    "in den warenkorb",
    "ajouter au panier",
];

/// Detect products on the page, deduplicated by name.
pub(crate) fn extract_products(doc: &Html, base: &Url) -> Vec<ProductRecord> {
    let mut products = from_json_ld(doc, base);
    if products.is_empty() {
        products = from_microdata(doc, base);
    }
    if products.is_empty() {
        products = from_dom_heuristics(doc, base);
    }

    let mut seen = HashSet::new();
    products.retain(|p| !p.name.is_empty() && seen.insert(p.name.to_lowercase()));
    products.truncate(MAX_PRODUCTS);
    products
}

// ---------------------------------------------------------------------------
// JSON-LD
// ---------------------------------------------------------------------------

fn from_json_ld(doc: &Html, base: &Url) -> Vec<ProductRecord> {
    let script_sel =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector");
    let mut products = Vec::new();

    for script in doc.select(&script_sel) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_ld_products(&value, base, &mut products),
            Err(e) => debug!(error = %e, "skipping malformed JSON-LD block"),
        }
    }

    products
}

fn collect_ld_products(value: &Value, base: &Url, out: &mut Vec<ProductRecord>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_ld_products(item, base, out);
            }
        }
        Value::Object(map) => {
            if is_ld_type(value, "Product") {
                if let Some(product) = ld_product(value, base) {
                    out.push(product);
                }
                return;
            }
            for key in ["@graph", "itemListElement", "item", "mainEntity"] {
                if let Some(nested) = map.get(key) {
                    collect_ld_products(nested, base, out);
                }
            }
        }
        _ => {}
    }
}

fn is_ld_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn ld_product(value: &Value, base: &Url) -> Option<ProductRecord> {
    let name = ld_string(value.get("name"))?;

    let offer = match value.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        Some(other) => Some(other),
        None => None,
    };
    let offer_price = offer.and_then(|o| o.get("price").or_else(|| o.get("lowPrice")));
    let offer_currency = offer
        .and_then(|o| o.get("priceCurrency"))
        .and_then(Value::as_str)
        .map(|c| c.trim().to_ascii_uppercase());

    let parsed = offer_price.and_then(|p| match p {
        Value::Number(n) => n.as_f64().map(|amount| Price {
            amount,
            currency: None,
        }),
        Value::String(s) => parse_price(s),
        _ => None,
    });

    let features = value
        .get("additionalProperty")
        .and_then(Value::as_array)
        .map(|props| {
            props
                .iter()
                .filter_map(|p| {
                    let name = ld_string(p.get("name"))?;
                    Some(match ld_string(p.get("value")) {
                        Some(v) => format!("{name}: {v}"),
                        None => name,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ProductRecord {
        name,
        price: parsed.as_ref().map(|p| p.amount),
        currency: offer_currency.or_else(|| parsed.and_then(|p| p.currency)),
        description: ld_string(value.get("description")),
        image_url: ld_image(value.get("image"))
            .and_then(|src| resolve_href(base, &src))
            .map(|u| u.to_string()),
        product_url: ld_string(value.get("url"))
            .and_then(|u| resolve_href(base, &u))
            .map(|u| u.to_string()),
        category: ld_string(value.get("category")),
        features,
    })
}

fn ld_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ld_string(map.get("name")),
        Value::Array(items) => ld_string(items.first()),
        _ => None,
    }
}

fn ld_image(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => ld_image(items.first()),
        Value::Object(map) => ld_string(map.get("url").or_else(|| map.get("contentUrl"))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Microdata
// ---------------------------------------------------------------------------

fn from_microdata(doc: &Html, base: &Url) -> Vec<ProductRecord> {
    let scope_sel = Selector::parse(r#"[itemscope][itemtype*="schema.org/Product"]"#)
        .expect("valid selector");

    doc.select(&scope_sel)
        .filter_map(|scope| microdata_product(scope, base))
        .collect()
}

fn microdata_product(scope: ElementRef<'_>, base: &Url) -> Option<ProductRecord> {
    let name = itemprop(scope, "name")?;

    let currency = itemprop(scope, "priceCurrency").map(|c| c.to_ascii_uppercase());
    let parsed = itemprop(scope, "price").and_then(|p| parse_price(&p));

    Some(ProductRecord {
        name,
        price: parsed.as_ref().map(|p| p.amount),
        currency: currency.or_else(|| parsed.and_then(|p| p.currency)),
        description: itemprop(scope, "description"),
        image_url: itemprop(scope, "image")
            .and_then(|src| resolve_href(base, &src))
            .map(|u| u.to_string()),
        product_url: itemprop(scope, "url")
            .and_then(|u| resolve_href(base, &u))
            .map(|u| u.to_string()),
        category: itemprop(scope, "category"),
        features: Vec::new(),
    })
}

/// Value of the first `[itemprop=name]` under `scope`: `content`, then
/// `src`/`href`, then text.
fn itemprop(scope: ElementRef<'_>, name: &str) -> Option<String> {
    let sel = Selector::parse(&format!(r#"[itemprop="{name}"]"#)).ok()?;
    let el = scope.select(&sel).next()?;
    let attrs = el.value();
    attrs
        .attr("content")
        .or_else(|| attrs.attr("src"))
        .or_else(|| attrs.attr("href"))
        .map(|v| v.trim().to_string())
        .or_else(|| Some(element_text(el, false)))
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// DOM heuristics
// ---------------------------------------------------------------------------

fn from_dom_heuristics(doc: &Html, base: &Url) -> Vec<ProductRecord> {
    let card_sel = Selector::parse(CARD_SELECTORS).expect("valid selector");
    let mut products: Vec<ProductRecord> = doc
        .select(&card_sel)
        .filter_map(|card| card_product(card, base, false))
        .collect();

    if products.is_empty() {
        let button_sel =
            Selector::parse(r#"button, a, input[type="submit"]"#).expect("valid selector");
        for button in doc.select(&button_sel).filter(|b| is_cart_affordance(*b)) {
            let container = button
                .ancestors()
                .filter_map(ElementRef::wrap)
                .take(MAX_ANCESTOR_HOPS)
                .find_map(|ancestor| card_product(ancestor, base, true));
            if let Some(product) = container {
                products.push(product);
            }
        }
    }

    products
}

/// A product from a container holding a name and a currency-marked price.
///
/// `has_cart` lets a container with a cart button but no visible price count.
fn card_product(card: ElementRef<'_>, base: &Url, has_cart: bool) -> Option<ProductRecord> {
    let name_sel = Selector::parse(NAME_SELECTORS).expect("valid selector");
    let name = card
        .select(&name_sel)
        .map(|el| element_text(el, false))
        .find(|t| !t.is_empty() && t.chars().count() <= 200)?;

    let price = find_price(&element_text(card, false));
    if price.is_none() && !has_cart && !contains_cart_affordance(card) {
        return None;
    }

    let img_sel = Selector::parse("img").expect("valid selector");
    let image_url = card
        .select(&img_sel)
        .next()
        .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
        .and_then(|src| resolve_href(base, src))
        .map(|u| u.to_string());

    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let product_url = card
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_href(base, href))
        .map(|u| u.to_string());

    let currency = price
        .as_ref()
        .and_then(|p| p.currency.as_deref())
        .and_then(currency_code)
        .map(str::to_string);

    Some(ProductRecord {
        name,
        price: price.map(|p| p.amount),
        currency,
        description: None,
        image_url,
        product_url,
        category: None,
        features: Vec::new(),
    })
}

fn contains_cart_affordance(card: ElementRef<'_>) -> bool {
    let button_sel = Selector::parse(r#"button, a, input[type="submit"]"#).expect("valid selector");
    card.select(&button_sel).any(is_cart_affordance)
}

fn is_cart_affordance(el: ElementRef<'_>) -> bool {
    let label = format!(
        "{} {} {}",
        el.text().collect::<String>(),
        el.value().attr("value").unwrap_or_default(),
        el.value().attr("aria-label").unwrap_or_default()
    )
    .to_lowercase();
    CART_PHRASES.iter().any(|phrase| label.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example/bowls/").unwrap()
    }

    #[test]
    fn json_ld_product_with_offer() {
        let doc = Html::parse_document(
            r#"<html><head><script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[
              {"@type":"WebPage","name":"Bowls"},
              {"@type":"Product","name":"Tea Bowl","description":"Hand thrown",
               "image":["/img/tea.jpg"],"url":"/bowls/tea","category":"Ceramics",
               "additionalProperty":[{"name":"Glaze","value":"Tenmoku"}],
               "offers":{"@type":"Offer","price":"1200","priceCurrency":"jpy"}}
            ]}
            </script></head><body></body></html>"#,
        );
        let products = extract_products(&doc, &base());
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.name, "Tea Bowl");
        assert_eq!(p.price, Some(1200.0));
        assert_eq!(p.currency.as_deref(), Some("JPY"));
        assert_eq!(p.image_url.as_deref(), Some("https://shop.example/img/tea.jpg"));
        assert_eq!(p.product_url.as_deref(), Some("https://shop.example/bowls/tea"));
        assert_eq!(p.category.as_deref(), Some("Ceramics"));
        assert_eq!(p.features, vec!["Glaze: Tenmoku".to_string()]);
    }

    #[test]
    fn malformed_json_ld_falls_through_to_microdata() {
        let doc = Html::parse_document(
            r#"<html><head><script type="application/ld+json">{not json</script></head>
            <body><div itemscope itemtype="https://schema.org/Product">
              <span itemprop="name">Sake Cup</span>
              <meta itemprop="priceCurrency" content="USD">
              <span itemprop="price" content="24.50">$24.50</span>
              <img itemprop="image" src="cup.jpg">
            </div></body></html>"#,
        );
        let products = extract_products(&doc, &base());
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Sake Cup");
        assert_eq!(products[0].price, Some(24.5));
        assert_eq!(products[0].currency.as_deref(), Some("USD"));
        assert_eq!(
            products[0].image_url.as_deref(),
            Some("https://shop.example/bowls/cup.jpg")
        );
    }

    #[test]
    fn heuristic_cards_with_prices() {
        let doc = Html::parse_document(
            r#"<body><ul>
              <li class="product-card"><a href="/p/1"><h3>Plate</h3></a><span>¥1,200</span></li>
              <li class="product-card"><a href="/p/2"><h3>Cup</h3></a><span>¥800</span></li>
              <li class="product-card"><h3>Gift card</h3><span>Ask in store</span></li>
            </ul></body>"#,
        );
        let products = extract_products(&doc, &base());
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Plate");
        assert_eq!(products[0].price, Some(1200.0));
        assert_eq!(products[0].currency.as_deref(), Some("JPY"));
        assert_eq!(products[0].product_url.as_deref(), Some("https://shop.example/p/1"));
        assert_eq!(products[1].name, "Cup");
    }

    #[test]
    fn cart_button_locates_product_container() {
        let doc = Html::parse_document(
            r#"<body><div class="detail">
              <h1>Indigo Noren</h1>
              <p class="cost">$45.00</p>
              <button type="button">Add to Cart</button>
            </div></body>"#,
        );
        let products = extract_products(&doc, &base());
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Indigo Noren");
        assert_eq!(products[0].price, Some(45.0));
        assert_eq!(products[0].currency.as_deref(), Some("USD"));
    }

    #[test]
    fn plain_pages_have_no_products() {
        let doc = Html::parse_document("<body><h1>About us</h1><p>Since 1998.</p></body>");
        assert!(extract_products(&doc, &base()).is_empty());
    }
}

use pcb_guru_common::Component;
use reqwest::Url;

const DATASHEET_SEARCH_URL: &str = "https://www.google.com/search";

/// データシートのURL（解析結果になければ MPN で検索するURL）
pub fn datasheet_url(component: &Component) -> String {
    if let Some(url) = component.datasheet_url.as_deref().filter(|u| !u.trim().is_empty()) {
        return url.to_string();
    }

    let part = if component.mpn.trim().is_empty() {
        component.designator.trim()
    } else {
        component.mpn.trim()
    };
    let query = format!("{} datasheet", part);

    match Url::parse_with_params(DATASHEET_SEARCH_URL, &[("q", query.as_str())]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}?q={}", DATASHEET_SEARCH_URL, query.replace(' ', "+")),
    }
}

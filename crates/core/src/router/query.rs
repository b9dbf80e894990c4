//! Query string parsing for hash routes.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;

/// Decoded query parameters, ordered by key.
pub type QueryParams = BTreeMap<String, String>;

/// Parse `a=1&b=2` into a map.
///
/// Pairs split on the first `=`; a pair without `=` maps to an empty value.
/// Keys and values are percent-decoded (`+` is kept literally). Invalid
/// UTF-8 after decoding is replaced rather than rejected. Later duplicates
/// overwrite earlier ones.
pub fn parse_query_string(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    if query.is_empty() {
        return params;
    }

    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode(key), decode(value));
    }

    params
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

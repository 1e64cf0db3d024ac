//! Scanners for year and period tokens in path segments and filenames.

/// First `20dd` token bounded by non-digits, with its byte offset.
#[must_use]
pub fn find_year_span(text: &str) -> Option<(usize, u16)> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(3)).find_map(|start| {
        let window = &bytes[start..start + 4];
        let bounded_left = start == 0 || !bytes[start - 1].is_ascii_digit();
        let bounded_right = bytes.get(start + 4).is_none_or(|b| !b.is_ascii_digit());
        let is_year = window[0] == b'2'
            && window[1] == b'0'
            && window[2].is_ascii_digit()
            && window[3].is_ascii_digit();
        (bounded_left && bounded_right && is_year).then(|| {
            let decade = u16::from(window[2] - b'0');
            let unit = u16::from(window[3] - b'0');
            (start, 2000 + decade * 10 + unit)
        })
    })
}

/// First `20dd` year token in `text`.
#[must_use]
pub fn find_year(text: &str) -> Option<u16> {
    find_year_span(text).map(|(_, year)| year)
}

/// Period token for a whole path segment: `Q1`..`Q4` becomes `q{n}`, a month
/// number `1`..`12` (optionally zero padded) becomes `m{n}`.
#[must_use]
pub fn period_from_segment(segment: &str) -> Option<String> {
    let segment = segment.trim();
    if let Some(rest) = segment
        .strip_prefix('Q')
        .or_else(|| segment.strip_prefix('q'))
    {
        return match rest {
            "1" | "2" | "3" | "4" => Some(format!("q{rest}")),
            _ => None,
        };
    }
    month_number(segment).map(|month| format!("m{month}"))
}

fn month_number(segment: &str) -> Option<u8> {
    if segment.is_empty() || segment.len() > 2 || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment
        .parse::<u8>()
        .ok()
        .filter(|month| (1..=12).contains(month))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_tokens_need_digit_boundaries() {
        assert_eq!(find_year("2023"), Some(2023));
        assert_eq!(find_year("Boekjaar 2021"), Some(2021));
        assert_eq!(find_year("jaarrekening_2019_def.pdf"), Some(2019));
        assert_eq!(find_year("120234"), None);
        assert_eq!(find_year("1999"), None);
        assert_eq!(find_year("202"), None);
        assert_eq!(find_year("x20235 2024"), Some(2024));
    }

    #[test]
    fn year_span_reports_offset() {
        assert_eq!(find_year_span("a/2022/b"), Some((2, 2022)));
    }

    #[test]
    fn quarters_and_months_map_to_periods() {
        assert_eq!(period_from_segment("Q3").as_deref(), Some("q3"));
        assert_eq!(period_from_segment("q1").as_deref(), Some("q1"));
        assert_eq!(period_from_segment("Q5"), None);
        assert_eq!(period_from_segment("Q12"), None);
        assert_eq!(period_from_segment("03").as_deref(), Some("m3"));
        assert_eq!(period_from_segment("12").as_deref(), Some("m12"));
        assert_eq!(period_from_segment("00"), None);
        assert_eq!(period_from_segment("13"), None);
        assert_eq!(period_from_segment("2023"), None);
        assert_eq!(period_from_segment("Quarter"), None);
    }
}

//! Page range parsing for the extract subcommand.
//!
//! Accepts `A`, `A-B`, `A-`, and comma-separated combinations, 1-indexed.
//! Out-of-range pages are clamped to the page count.

/// Parse a range expression into 0-indexed page numbers.
///
/// Returns an error message for malformed input; an expression that clamps
/// down to nothing yields an empty list.
pub fn parse_page_range(expr: &str, page_count: usize) -> Result<Vec<usize>, String> {
    let mut pages = Vec::new();

    for part in expr.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err("empty range component".to_string());
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_page_number(start.trim())?;
            let end = if end.trim().is_empty() {
                page_count
            } else {
                parse_page_number(end.trim())?
            };
            if end < start {
                return Err(format!("backwards range: {}", part));
            }
            for page in start..=end.min(page_count) {
                push_page(&mut pages, page, page_count);
            }
        } else {
            let page = parse_page_number(part)?;
            push_page(&mut pages, page, page_count);
        }
    }

    Ok(pages)
}

fn parse_page_number(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("invalid page number: {:?}", s))?;
    if n == 0 {
        return Err("page numbers are 1-indexed".to_string());
    }
    Ok(n)
}

fn push_page(pages: &mut Vec<usize>, page: usize, page_count: usize) {
    if page <= page_count && !pages.contains(&(page - 1)) {
        pages.push(page - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page() {
        assert_eq!(parse_page_range("3", 10).unwrap(), vec![2]);
    }

    #[test]
    fn closed_range() {
        assert_eq!(parse_page_range("2-4", 10).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn open_range_runs_to_end() {
        assert_eq!(parse_page_range("8-", 10).unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn comma_list_mixes_forms() {
        assert_eq!(parse_page_range("1,3-4,9-", 10).unwrap(), vec![0, 2, 3, 8, 9]);
    }

    #[test]
    fn clamps_to_page_count() {
        assert_eq!(parse_page_range("9-20", 10).unwrap(), vec![8, 9]);
        assert_eq!(parse_page_range("15", 10).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_page_range("0", 10).is_err());
        assert!(parse_page_range("a-b", 10).is_err());
        assert!(parse_page_range("4-2", 10).is_err());
        assert!(parse_page_range("", 10).is_err());
    }

    #[test]
    fn duplicates_are_dropped() {
        assert_eq!(parse_page_range("2,2,1-3", 10).unwrap(), vec![1, 0, 2]);
    }
}

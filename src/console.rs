//! Plain-text rendering for the command line.

/// Renders `rows` under `headers` as a bordered table, one line per row.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut result = String::new();

    // Width of each column is its longest cell
    let mut column_widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, col) in row.iter().enumerate() {
            if i < column_widths.len() {
                column_widths[i] = column_widths[i].max(col.len());
            }
        }
    }

    let border = |result: &mut String| {
        result.push('+');
        for width in &column_widths {
            result.push_str(&"-".repeat(*width));
            result.push('+');
        }
        result.push('\n');
    };

    border(&mut result);
    if !headers.is_empty() {
        result.push('|');
        for (i, header) in headers.iter().enumerate() {
            result.push_str(&format!("{:<width$}|", header, width = column_widths[i]));
        }
        result.push('\n');
        border(&mut result);
    }
    for row in rows {
        result.push('|');
        for (i, col) in row.iter().take(column_widths.len()).enumerate() {
            result.push_str(&format!("{:<width$}|", col, width = column_widths[i]));
        }
        result.push('\n');
    }
    if !rows.is_empty() {
        border(&mut result);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table() {
        let headers = vec!["Page".to_string(), "Keys".to_string()];
        let rows = vec![
            vec!["0".to_string(), "[1, 2]".to_string()],
            vec!["12".to_string(), "[]".to_string()],
        ];
        let expected = "\
+----+------+
|Page|Keys  |
+----+------+
|0   |[1, 2]|
|12  |[]    |
+----+------+
";
        assert_eq!(render_table(&headers, &rows), expected);
    }
}

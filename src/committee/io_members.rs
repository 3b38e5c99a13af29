// Reading the membership roll.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::committee::io_common::Table;
use crate::committee::*;

pub const MEMBERS_USERNAME_COLUMN: &str = "UC Username";

/// 3 or 4 letters followed by 2 or 3 digits, i.e. `abc12` or `abcd123`.
pub fn valid_usercode(code: &str) -> bool {
    lazy_static! {
        static ref USERCODE_RX: Regex = Regex::new(r"^[A-Za-z]{3,4}\d{2,3}").unwrap();
    }
    USERCODE_RX.is_match(code)
}

pub fn normalize_usercode(code: &str) -> String {
    code.trim().to_lowercase()
}

/// The usercodes of all the members, in lower case.
pub fn read_members(table: &Table, column: &str, path: &str) -> VoteResult<HashSet<String>> {
    let idx = table
        .column_index(column)
        .context(MissingColumnSnafu { column, path })?;
    let mut members: HashSet<String> = HashSet::new();
    for (lineno, row) in table.rows.iter().enumerate() {
        let code = Table::cell(row, idx).trim();
        if valid_usercode(code) {
            members.insert(normalize_usercode(code));
        } else {
            debug!(
                "read_members: {}:{}: ignoring usercode {:?}",
                path,
                lineno + 2,
                code
            );
        }
    }
    Ok(members)
}

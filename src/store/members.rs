use std::path::Path;

use anyhow::Result;

use crate::error::RecordError;
use crate::models::Member;

use super::files::{parse_id, read_records, split_fields, write_records, Loaded};

impl Member {
    /// Encode as `id,name,email,b1;b2;...`; the last field is empty when the
    /// member holds nothing.
    pub fn to_record(&self) -> String {
        let issued: Vec<String> = self
            .issued_book_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        format!(
            "{},{},{},{}",
            self.id(),
            self.name(),
            self.email(),
            issued.join(";")
        )
    }

    /// Decode one stored row. At least four fields are required and anything
    /// after the fourth is ignored. Blank entries in the issued list are
    /// skipped; any other non-numeric entry makes the whole row malformed.
    pub fn from_record(line: &str) -> Result<Self, RecordError> {
        let parts = split_fields(line);
        let [id, name, email, issued, ..] = parts.as_slice() else {
            return Err(RecordError::FieldCount {
                expected: "at least 4",
                found: parts.len(),
            });
        };

        let mut member = Member::from_parts(
            parse_id("member id", id)?,
            name.to_string(),
            email.to_string(),
        );
        for token in issued.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            member.add_issued_book(parse_id("issued book id", token)?);
        }
        Ok(member)
    }
}

/// Read every decodable member from `path`.
pub fn load_members(path: &Path) -> Result<Loaded<Member>> {
    read_records(path, "member", Member::from_record)
}

/// Replace the contents of `path` with `members`, one row each.
pub fn save_members<'a>(path: &Path, members: impl IntoIterator<Item = &'a Member>) -> Result<()> {
    write_records(path, members.into_iter().map(Member::to_record))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn member_with(ids: &[u32]) -> Member {
        let mut member = Member::new(201, "Ada Lovelace", "ada@example.com").unwrap();
        for id in ids {
            member.add_issued_book(*id);
        }
        member
    }

    #[test]
    fn encodes_issued_ids_with_semicolons() {
        assert_eq!(member_with(&[]).to_record(), "201,Ada Lovelace,ada@example.com,");
        assert_eq!(
            member_with(&[104, 101, 130]).to_record(),
            "201,Ada Lovelace,ada@example.com,104;101;130"
        );
    }

    #[test]
    fn round_trip_preserves_issue_order() {
        for ids in [&[][..], &[101][..], &[130, 101, 117, 102][..]] {
            let original = member_with(ids);
            let decoded = Member::from_record(&original.to_record()).unwrap();
            assert_eq!(decoded, original);
            assert_eq!(decoded.issued_book_ids(), ids);
        }
    }

    #[test]
    fn lenient_issued_list() {
        let member = Member::from_record("202,Grace,grace@example.com, 101 ;;102;101;").unwrap();
        assert_eq!(member.issued_book_ids(), &[101, 102]);

        let member = Member::from_record("202,Grace,grace@example.com,,extra").unwrap();
        assert!(member.issued_book_ids().is_empty());
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert_eq!(
            Member::from_record("202,Grace,grace@example.com"),
            Err(RecordError::FieldCount {
                expected: "at least 4",
                found: 3
            })
        );
        assert!(matches!(
            Member::from_record("202,Grace,grace@example.com,101;abc"),
            Err(RecordError::InvalidNumber { field: "issued book id", .. })
        ));
        assert!(Member::from_record("x,Grace,grace@example.com,").is_err());
    }

    #[test]
    fn load_skips_bad_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.txt");
        fs::write(
            &path,
            "201,Ada,ada@example.com,101\nnot a member\n202,Grace,grace@example.com,\n",
        )
        .unwrap();

        let loaded = load_members(&path).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.records[0].issued_book_ids(), &[101]);
    }

    #[test]
    fn save_then_load_round_trips_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.txt");
        let members = vec![
            member_with(&[102, 101]),
            Member::new(202, "Grace", "grace@example.com").unwrap(),
        ];
        save_members(&path, &members).unwrap();

        let loaded = load_members(&path).unwrap();
        assert_eq!(loaded.records, members);
        assert!(loaded.skipped.is_empty());
    }
}

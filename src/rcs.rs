// src/rcs.rs
//
// Decoder for the RCS file format (rcsfile(5)) as written by CVS.

use crate::error::{Error, Result};
use crate::model::{AdminHeader, Delta, RcsFile, Timestamp};
use crate::revision::RevisionId;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a [u8]),
    Str(Vec<u8>),
    Colon,
    Semi,
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Header,
    Delta,
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
    peeked: Option<(usize, Option<Token<'a>>)>,
    section: Section,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Lexer {
            data,
            pos: 0,
            peeked: None,
            section: Section::Header,
        }
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        match self.section {
            Section::Header => Error::MalformedHeader { offset, reason },
            Section::Delta => Error::MalformedDelta { offset, reason },
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn lex(&mut self) -> Result<(usize, Option<Token<'a>>)> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(&b) = self.data.get(self.pos) else {
            return Ok((start, None));
        };
        let token = match b {
            b';' => {
                self.pos += 1;
                Token::Semi
            }
            b':' => {
                self.pos += 1;
                Token::Colon
            }
            b'@' => Token::Str(self.lex_string(start)?),
            _ => {
                while let Some(&c) = self.data.get(self.pos) {
                    if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c | b';' | b':' | b'@') {
                        break;
                    }
                    self.pos += 1;
                }
                let data = self.data;
                Token::Word(&data[start..self.pos])
            }
        };
        Ok((start, Some(token)))
    }

    /// `@...@` with `@@` standing for a literal `@`.
    fn lex_string(&mut self, start: usize) -> Result<Vec<u8>> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            let rest = &self.data[self.pos..];
            let Some(at) = rest.iter().position(|&c| c == b'@') else {
                return Err(self.error(start, "unterminated @-string"));
            };
            out.extend_from_slice(&rest[..at]);
            self.pos += at + 1;
            if self.data.get(self.pos) == Some(&b'@') {
                out.push(b'@');
                self.pos += 1;
            } else {
                return Ok(out);
            }
        }
    }

    fn peek(&mut self) -> Result<(usize, Option<&Token<'a>>)> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lex()?);
        }
        match &self.peeked {
            Some((offset, token)) => Ok((*offset, token.as_ref())),
            None => unreachable!(),
        }
    }

    fn next(&mut self) -> Result<(usize, Option<Token<'a>>)> {
        match self.peeked.take() {
            Some(peeked) => Ok(peeked),
            None => self.lex(),
        }
    }

    /// Whether the token after the next one is the word `keyword`. Consumes nothing.
    fn second_is(&mut self, keyword: &str) -> Result<bool> {
        let saved = (self.pos, self.peeked.clone());
        self.next()?;
        let found = matches!(self.next()?, (_, Some(Token::Word(w))) if w == keyword.as_bytes());
        (self.pos, self.peeked) = saved;
        Ok(found)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<usize> {
        match self.next()? {
            (offset, Some(Token::Word(w))) if w == keyword.as_bytes() => Ok(offset),
            (offset, other) => Err(self.error(
                offset,
                format!("expected '{keyword}', found {}", describe(other.as_ref())),
            )),
        }
    }

    fn expect_semi(&mut self) -> Result<()> {
        match self.next()? {
            (_, Some(Token::Semi)) => Ok(()),
            (offset, other) => Err(self.error(
                offset,
                format!("expected ';', found {}", describe(other.as_ref())),
            )),
        }
    }

    fn expect_string(&mut self) -> Result<Vec<u8>> {
        match self.next()? {
            (_, Some(Token::Str(s))) => Ok(s),
            (offset, other) => Err(self.error(
                offset,
                format!("expected @-string, found {}", describe(other.as_ref())),
            )),
        }
    }

    fn expect_word(&mut self) -> Result<(usize, &'a [u8])> {
        match self.next()? {
            (offset, Some(Token::Word(w))) => Ok((offset, w)),
            (offset, other) => Err(self.error(
                offset,
                format!("expected identifier, found {}", describe(other.as_ref())),
            )),
        }
    }

    fn expect_revision(&mut self) -> Result<RevisionId> {
        let (offset, word) = self.expect_word()?;
        self.revision(offset, word)
    }

    fn revision(&self, offset: usize, word: &[u8]) -> Result<RevisionId> {
        std::str::from_utf8(word)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error(offset, format!("invalid revision '{}'", lossy(word))))
    }

    /// `{ num } ;`
    fn optional_revision(&mut self) -> Result<Option<RevisionId>> {
        let rev = match self.peek()? {
            (_, Some(Token::Semi)) => None,
            _ => Some(self.expect_revision()?),
        };
        self.expect_semi()?;
        Ok(rev)
    }

    /// `{ string } ;`
    fn optional_string(&mut self) -> Result<Option<Vec<u8>>> {
        let s = match self.peek()? {
            (_, Some(Token::Str(_))) => Some(self.expect_string()?),
            _ => None,
        };
        self.expect_semi()?;
        Ok(s)
    }

    /// Skips an unknown `newphrase` up to and including its `;`.
    fn skip_phrase(&mut self) -> Result<()> {
        loop {
            match self.next()? {
                (_, Some(Token::Semi)) => return Ok(()),
                (offset, None) => return Err(self.error(offset, "unexpected end of file in phrase")),
                _ => {}
            }
        }
    }
}

fn describe(token: Option<&Token<'_>>) -> String {
    match token {
        None => "end of file".to_string(),
        Some(Token::Word(w)) => format!("'{}'", lossy(w)),
        Some(Token::Str(_)) => "@-string".to_string(),
        Some(Token::Colon) => "':'".to_string(),
        Some(Token::Semi) => "';'".to_string(),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn is_num(word: &[u8]) -> bool {
    !word.is_empty() && word.iter().all(|&c| c.is_ascii_digit() || c == b'.')
}

/// Parses `YYYY.MM.DD.hh.mm.ss`; two-digit years are in the 1900s.
pub fn parse_date(s: &str) -> Option<Timestamp> {
    let parts: Vec<u32> = s.split('.').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    let &[year, month, day, hour, minute, second] = parts.as_slice() else {
        return None;
    };
    let year = if year < 100 { year + 1900 } else { year };
    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Decodes one RCS file.
pub fn parse(data: &[u8]) -> Result<RcsFile> {
    let mut lexer = Lexer::new(data);
    let mut header = parse_admin(&mut lexer)?;

    lexer.section = Section::Delta;
    let mut deltas: HashMap<RevisionId, Delta> = HashMap::new();
    let mut order = Vec::new();
    while let (offset, Some(Token::Word(w))) = lexer.peek()? {
        // Without a `desc` section the deltatext follows directly: `1.1 log ...`.
        if !is_num(w) || lexer.second_is("log")? {
            break;
        }
        let delta = parse_delta(&mut lexer)?;
        if deltas.contains_key(&delta.revision) {
            return Err(lexer.error(offset, format!("duplicate revision {}", delta.revision)));
        }
        order.push(delta.revision.clone());
        deltas.insert(delta.revision.clone(), delta);
    }

    if matches!(lexer.peek()?, (_, Some(Token::Word(w))) if *w == b"desc") {
        lexer.section = Section::Header;
        lexer.next()?;
        header.description = lexer.expect_string()?;
    }

    lexer.section = Section::Delta;
    let mut with_text = HashSet::new();
    loop {
        let (offset, word) = match lexer.next()? {
            (_, None) => break,
            (offset, Some(Token::Word(w))) => (offset, w),
            (offset, other) => {
                return Err(lexer.error(
                    offset,
                    format!("expected revision, found {}", describe(other.as_ref())),
                ))
            }
        };
        let revision = lexer.revision(offset, word)?;
        lexer.expect_keyword("log")?;
        let log = lexer.expect_string()?;
        loop {
            match lexer.peek()? {
                (_, Some(Token::Word(w))) if *w == b"text" => break,
                (_, Some(Token::Word(_))) => lexer.skip_phrase()?,
                (offset, other) => {
                    let found = describe(other);
                    return Err(lexer.error(offset, format!("expected 'text', found {found}")));
                }
            }
        }
        lexer.expect_keyword("text")?;
        let text = lexer.expect_string()?;

        let Some(delta) = deltas.get_mut(&revision) else {
            return Err(lexer.error(offset, format!("text for unknown revision {revision}")));
        };
        if !with_text.insert(revision.clone()) {
            return Err(lexer.error(offset, format!("duplicate text for revision {revision}")));
        }
        delta.log = log;
        delta.text = text;
    }

    if let Some(missing) = order.iter().find(|rev| !with_text.contains(*rev)) {
        return Err(Error::MalformedDelta {
            offset: data.len(),
            reason: format!("no text for revision {missing}"),
        });
    }

    Ok(RcsFile {
        header,
        deltas,
        order,
    })
}

fn parse_admin(lexer: &mut Lexer<'_>) -> Result<AdminHeader> {
    let mut header = AdminHeader::default();
    lexer.expect_keyword("head")?;
    header.head = lexer.optional_revision()?;

    loop {
        let (offset, word) = match lexer.peek()? {
            (offset, Some(Token::Word(w))) => (offset, *w),
            (offset, other) => {
                let found = describe(other);
                return Err(lexer.error(offset, format!("expected keyword, found {found}")));
            }
        };
        if is_num(word) || word == b"desc" {
            return Ok(header);
        }
        lexer.next()?;
        match word {
            b"branch" => header.branch = lexer.optional_revision()?,
            b"access" => {
                while let (_, Some(Token::Word(_))) = lexer.peek()? {
                    let (_, id) = lexer.expect_word()?;
                    header.access.push(lossy(id));
                }
                lexer.expect_semi()?;
            }
            b"symbols" => {
                header.symbols = parse_pairs(lexer)?;
            }
            b"locks" => {
                header.locks = parse_pairs(lexer)?;
            }
            b"strict" => {
                header.strict = true;
                lexer.expect_semi()?;
            }
            b"comment" => header.comment = lexer.optional_string()?,
            b"expand" => header.expand = lexer.optional_string()?,
            _ => {
                tracing::trace!(offset, keyword = %lossy(word), "skipping unknown admin phrase");
                lexer.skip_phrase()?;
            }
        }
    }
}

/// `{ id : num }* ;`
fn parse_pairs(lexer: &mut Lexer<'_>) -> Result<std::collections::BTreeMap<String, RevisionId>> {
    let mut pairs = std::collections::BTreeMap::new();
    loop {
        match lexer.next()? {
            (_, Some(Token::Semi)) => return Ok(pairs),
            (_, Some(Token::Word(name))) => {
                match lexer.next()? {
                    (_, Some(Token::Colon)) => {}
                    (offset, other) => {
                        return Err(lexer.error(
                            offset,
                            format!("expected ':', found {}", describe(other.as_ref())),
                        ))
                    }
                }
                let rev = lexer.expect_revision()?;
                pairs.insert(lossy(name), rev);
            }
            (offset, other) => {
                return Err(lexer.error(
                    offset,
                    format!("expected symbol, found {}", describe(other.as_ref())),
                ))
            }
        }
    }
}

fn parse_delta(lexer: &mut Lexer<'_>) -> Result<Delta> {
    let revision = lexer.expect_revision()?;

    lexer.expect_keyword("date")?;
    let (offset, word) = lexer.expect_word()?;
    let date = std::str::from_utf8(word)
        .ok()
        .and_then(parse_date)
        .ok_or_else(|| lexer.error(offset, format!("invalid date '{}'", lossy(word))))?;
    lexer.expect_semi()?;

    lexer.expect_keyword("author")?;
    let (_, author) = lexer.expect_word()?;
    lexer.expect_semi()?;

    lexer.expect_keyword("state")?;
    let state = match lexer.peek()? {
        (_, Some(Token::Word(_))) => lossy(lexer.expect_word()?.1),
        _ => String::new(),
    };
    lexer.expect_semi()?;

    lexer.expect_keyword("branches")?;
    let mut branches = Vec::new();
    while let (_, Some(Token::Word(_))) = lexer.peek()? {
        branches.push(lexer.expect_revision()?);
    }
    lexer.expect_semi()?;

    lexer.expect_keyword("next")?;
    let next = lexer.optional_revision()?;

    let mut commitid = None;
    loop {
        match lexer.peek()? {
            (_, Some(Token::Word(w))) if is_num(w) || *w == b"desc" => break,
            (_, Some(Token::Word(w))) if *w == b"commitid" => {
                lexer.next()?;
                commitid = Some(lossy(lexer.expect_word()?.1));
                lexer.expect_semi()?;
            }
            (_, Some(Token::Word(_))) => {
                lexer.next()?;
                lexer.skip_phrase()?;
            }
            (offset, other) => {
                let found = describe(other);
                return Err(lexer.error(offset, format!("expected delta or 'desc', found {found}")));
            }
        }
    }

    Ok(Delta {
        revision,
        date,
        author: lossy(author),
        state,
        branches,
        next,
        commitid,
        log: Vec::new(),
        text: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "head\t1.2;
access;
symbols
\tRELEASE_1_0:1.1
\tFEATURE_X:1.2.0.2;
locks; strict;
comment\t@# @;
expand\t@kv@;


1.2
date\t2005.03.14.10.00.00;\tauthor alice;\tstate Exp;
branches;
next\t1.1;
commitid\tabc123;

1.1
date\t99.12.31.23.59.59;\tauthor bob;\tstate Exp;
branches;
next\t;


desc
@a file@


1.2
log
@second with user@@example.com
@
text
@line one
line two
@


1.1
log
@Initial revision
@
text
@d2 1
@
";

    fn rev(s: &str) -> RevisionId {
        s.parse().unwrap()
    }

    #[test]
    fn decodes_header_and_deltas() {
        let file = parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(file.header.head, Some(rev("1.2")));
        assert_eq!(file.header.symbols.get("FEATURE_X"), Some(&rev("1.2.0.2")));
        assert_eq!(file.header.symbols.get("RELEASE_1_0"), Some(&rev("1.1")));
        assert!(file.header.strict);
        assert!(file.header.locks.is_empty());
        assert_eq!(file.header.comment.as_deref(), Some(&b"# "[..]));
        assert_eq!(file.header.expand.as_deref(), Some(&b"kv"[..]));
        assert_eq!(file.header.description, b"a file");
        assert_eq!(file.order, vec![rev("1.2"), rev("1.1")]);

        let head = file.delta(&rev("1.2")).unwrap();
        assert_eq!(head.author, "alice");
        assert_eq!(head.next, Some(rev("1.1")));
        assert_eq!(head.commitid.as_deref(), Some("abc123"));
        assert_eq!(head.log, b"second with user@example.com\n");
        assert_eq!(head.text, b"line one\nline two\n");
        assert_eq!(head.date.to_rfc3339(), "2005-03-14T10:00:00+00:00");

        let first = file.delta(&rev("1.1")).unwrap();
        assert_eq!(first.next, None);
        assert_eq!(first.date.to_rfc3339(), "1999-12-31T23:59:59+00:00");
    }

    #[test]
    fn tolerates_missing_optional_sections() {
        let data = "head ;\naccess ;\nsymbols ;\nlocks ;\n\ndesc\n@@\n";
        let file = parse(data.as_bytes()).unwrap();
        assert_eq!(file.header.head, None);
        assert!(file.header.comment.is_none());
        assert!(file.deltas.is_empty());
    }

    #[test]
    fn tolerates_missing_description() {
        let data = "head 1.1;\naccess;\nsymbols;\nlocks; strict;\ncomment @# @;\n\n\
                    1.1\ndate 2001.01.01.00.00.00; author joe; state Exp;\nbranches;\nnext ;\n\n\
                    1.1\nlog\n@x@\ntext\n@abc\n@\n";
        let file = parse(data.as_bytes()).unwrap();
        assert!(file.header.description.is_empty());
        let delta = file.delta(&rev("1.1")).unwrap();
        assert_eq!(delta.log, b"x");
        assert_eq!(delta.text, b"abc\n");
    }

    #[test]
    fn skips_unknown_phrases() {
        let data = "head 1.1;\naccess;\nsymbols;\nlocks;\nowner joe @x@ : 3;\n\n\
                    1.1\ndate 2001.01.01.00.00.00; author joe; state Exp;\nbranches;\nnext ;\nmergepoint1 1.0;\n\n\
                    desc\n@@\n\n1.1\nlog\n@x@\nhash 1 2;\ntext\n@abc\n@\n";
        let file = parse(data.as_bytes()).unwrap();
        assert_eq!(file.delta(&rev("1.1")).unwrap().text, b"abc\n");
    }

    #[test]
    fn reports_header_offset() {
        let err = parse(b"head 1.1\naccess;").unwrap_err();
        match err {
            Error::MalformedHeader { offset, .. } => assert_eq!(offset, 9),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_revisions() {
        let data = "head 1.1;\naccess;\nsymbols;\nlocks;\n\n\
                    1.1\ndate 2001.01.01.00.00.00; author joe; state Exp;\nbranches;\nnext ;\n\n\
                    1.1\ndate 2001.01.01.00.00.00; author joe; state Exp;\nbranches;\nnext ;\n\n\
                    desc\n@@\n";
        assert!(matches!(
            parse(data.as_bytes()),
            Err(Error::MalformedDelta { .. })
        ));
    }

    #[test]
    fn rejects_unterminated_string() {
        let data = "head 1.1;\naccess;\nsymbols;\nlocks;\n\n\
                    1.1\ndate 2001.01.01.00.00.00; author joe; state Exp;\nbranches;\nnext ;\n\n\
                    desc\n@@\n\n1.1\nlog\n@oops\ntext\n@abc\n";
        assert!(matches!(
            parse(data.as_bytes()),
            Err(Error::MalformedDelta { .. })
        ));
    }

    #[test]
    fn rejects_missing_text() {
        let data = "head 1.1;\naccess;\nsymbols;\nlocks;\n\n\
                    1.1\ndate 2001.01.01.00.00.00; author joe; state Exp;\nbranches;\nnext ;\n\n\
                    desc\n@@\n";
        assert!(matches!(
            parse(data.as_bytes()),
            Err(Error::MalformedDelta { .. })
        ));
    }

    #[test]
    fn date_formats() {
        assert!(parse_date("2005.03.14.10.00.00").is_some());
        assert_eq!(parse_date("98.01.02.03.04.05").unwrap().to_rfc3339(), "1998-01-02T03:04:05+00:00");
        assert!(parse_date("2005.13.14.10.00.00").is_none());
        assert!(parse_date("2005.03.14").is_none());
    }
}

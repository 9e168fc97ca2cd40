//! Per-RDBMS quoting, escaping and encoding rules.
//!
//! A [`Backend`] is a stateless descriptor. There is exactly one static
//! instance per [`BackendKind`], shared by every datasource of that kind:
//!
//! ```ignore
//! use sqlorm_core::{Backend, BackendKind};
//!
//! let pg = Backend::for_kind(BackendKind::Postgres);
//! assert_eq!(pg.string_literal("Ann"), "'Ann'");
//! assert_eq!(pg.string_literal("it's"), r"E'it\'s'");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::TextEncoding;
use crate::error::{Error, Result};

/// The RDBMS families SQL can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQL92 compliant backend using UTF-8
    Generic,
    Postgres,
    MySql,
    Firebird,
    Gadfly,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Backend::for_kind(*self).name)
    }
}

/// Static description of one backend's SQL dialect.
#[derive(Debug)]
pub struct Backend {
    pub kind: BackendKind,
    pub name: &'static str,
    identifier_quote: char,
    /// Replacements applied in order; earlier entries must not be
    /// reintroduced by later ones.
    escapes: &'static [(&'static str, &'static str)],
    placeholder: &'static str,
    /// Server charset name to canonical codec name. `None` marks charsets
    /// the server knows but that cannot be transcoded.
    encodings: &'static [(&'static str, Option<&'static str>)],
    supports_limit: bool,
}

const GENERIC_ESCAPES: &[(&str, &str)] = &[("\"", "\\\""), ("'", "\\\""), ("%", "%%")];

const POSTGRES_ESCAPES: &[(&str, &str)] = &[
    ("\\", "\\\\"),
    ("'", "\\'"),
    ("\"", "\\\""),
    ("\0", "\\000"),
    ("`", "\\`"),
    ("\n", "\\n"),
    ("\r", "\\r"),
    ("\t", "\\t"),
    ("%", "\\045"),
    ("?", "\\077"),
];

const POSTGRES_ENCODINGS: &[(&str, Option<&str>)] = &[
    ("SQL_ASCII", Some("ascii")),
    ("EUC_JP", None),
    ("EUC_CN", None),
    ("EUC_KR", None),
    ("JOHAB", None),
    ("EUC_TW", None),
    ("UNICODE", Some("utf-8")),
    ("UTF8", Some("utf-8")),
    ("MULE_INTERNAL", None),
    ("LATIN1", Some("iso-8859-1")),
    ("LATIN2", Some("iso-8859-2")),
    ("LATIN3", Some("iso-8859-3")),
    ("LATIN4", Some("iso-8859-4")),
    ("LATIN5", Some("iso-8859-9")),
    ("LATIN6", Some("iso-8859-10")),
    ("LATIN7", Some("iso-8859-13")),
    ("LATIN8", Some("iso-8859-14")),
    ("LATIN9", Some("iso-8859-15")),
    ("LATIN10", Some("iso-8859-16")),
    ("ISO_8859_5", Some("iso-8859-5")),
    ("ISO_8859_6", Some("iso-8859-6")),
    ("ISO_8859_7", Some("iso-8859-7")),
    ("ISO_8859_8", Some("iso-8859-8")),
    ("KOI8", None),
    ("WIN", None),
    ("ALT", None),
    ("WIN1256", None),
    ("TCVN", None),
    ("WIN874", None),
];

const MYSQL_ENCODINGS: &[(&str, Option<&str>)] = &[
    ("usa7", Some("us-ascii")),
    ("big5", Some("big5")),
    ("gbk", Some("gbk")),
    ("sjis", Some("sjis")),
    ("cp932", Some("sjis")),
    ("gb2312", Some("euc-cn")),
    ("ujis", Some("euc-jp")),
    ("euc-kr", Some("euc-kr")),
    ("latin1", Some("iso8859-1")),
    ("latin1-de", Some("iso8859-1")),
    ("german1", Some("iso8859-1")),
    ("danish", Some("iso8859-1")),
    ("latin2", Some("iso8859-2")),
    ("czech", Some("iso8859-2")),
    ("hungarian", Some("iso8859-2")),
    ("croat", Some("iso8859-2")),
    ("greek", Some("iso8859-7")),
    ("hebrew", Some("iso8859-8")),
    ("latin5", Some("iso8859-9")),
    ("latvian", Some("iso8859-13")),
    ("latvian1", Some("iso8859-13")),
    ("estonia", Some("iso8859-13")),
    ("dos", Some("cp437")),
    ("pclatin2", Some("cp852")),
    ("cp866", Some("cp866")),
    ("koi8-ru", Some("koi8-r")),
    ("tis620", Some("tis620")),
    ("win1250", Some("cp1250")),
    ("win1250ch", Some("cp1250")),
    ("win1251", Some("cp1251")),
    ("cp1251", Some("cp1251")),
    ("win1251ukr", Some("cp1251")),
    ("cp1257", Some("cp1257")),
    ("macroman", Some("macroman")),
    ("macce", Some("maccentraleurope")),
    ("utf8", Some("utf-8")),
    ("utf8mb4", Some("utf-8")),
    ("ucs2", Some("unicodebig")),
];

static GENERIC: Backend = Backend {
    kind: BackendKind::Generic,
    name: "generic",
    identifier_quote: '"',
    escapes: GENERIC_ESCAPES,
    placeholder: "%s",
    encodings: &[],
    supports_limit: true,
};

static POSTGRES: Backend = Backend {
    kind: BackendKind::Postgres,
    name: "pgsql",
    identifier_quote: '"',
    escapes: POSTGRES_ESCAPES,
    placeholder: "%s",
    encodings: POSTGRES_ENCODINGS,
    supports_limit: true,
};

static MYSQL: Backend = Backend {
    kind: BackendKind::MySql,
    name: "mysql",
    identifier_quote: '`',
    escapes: GENERIC_ESCAPES,
    placeholder: "%s",
    encodings: MYSQL_ENCODINGS,
    supports_limit: true,
};

static FIREBIRD: Backend = Backend {
    kind: BackendKind::Firebird,
    name: "firebird",
    identifier_quote: '"',
    escapes: GENERIC_ESCAPES,
    placeholder: "?",
    encodings: &[],
    supports_limit: true,
};

static GADFLY: Backend = Backend {
    kind: BackendKind::Gadfly,
    name: "gadfly",
    identifier_quote: '"',
    escapes: GENERIC_ESCAPES,
    placeholder: "?",
    encodings: &[],
    supports_limit: false,
};

impl Backend {
    /// The shared descriptor for `kind`.
    pub fn for_kind(kind: BackendKind) -> &'static Backend {
        match kind {
            BackendKind::Generic => &GENERIC,
            BackendKind::Postgres => &POSTGRES,
            BackendKind::MySql => &MYSQL,
            BackendKind::Firebird => &FIREBIRD,
            BackendKind::Gadfly => &GADFLY,
        }
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        let q = self.identifier_quote;
        format!("{q}{name}{q}")
    }

    /// Apply the escape table, in order.
    pub fn escape_string(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (from, to) in self.escapes {
            if out.contains(from) {
                out = out.replace(from, to);
            }
        }
        out
    }

    /// Wrap already escaped text in string quotes.
    ///
    /// PostgreSQL needs the `E'...'` form as soon as a backslash escape is
    /// present.
    pub fn quote_string(&self, escaped: &str) -> String {
        if self.kind == BackendKind::Postgres && escaped.contains('\\') {
            format!("E'{escaped}'")
        } else {
            format!("'{escaped}'")
        }
    }

    /// Escape and quote `text` in one go.
    pub fn string_literal(&self, text: &str) -> String {
        self.quote_string(&self.escape_string(text))
    }

    /// Placeholder for an out-of-band parameter.
    pub fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    /// False for backends without `LIMIT`.
    pub fn supports_limit(&self) -> bool {
        self.supports_limit
    }

    /// Map a charset name reported by the server to a text encoding.
    ///
    /// Backends without a charset table take canonical codec names. Names
    /// missing from the table are an error rather than a guess.
    pub fn resolve_encoding(&self, server_name: &str) -> Result<TextEncoding> {
        if self.encodings.is_empty() {
            return Ok(TextEncoding::from_name(server_name));
        }

        let found = self
            .encodings
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(server_name.trim()));
        match found {
            Some((_, Some(codec))) => Ok(TextEncoding::from_name(codec)),
            Some((name, None)) => Ok(TextEncoding::Unsupported((*name).to_string())),
            None => Err(Error::Encoding(format!(
                "unknown {} backend encoding {server_name:?}",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quotes() {
        assert_eq!(
            Backend::for_kind(BackendKind::Postgres).quote_identifier("first name"),
            "\"first name\""
        );
        assert_eq!(
            Backend::for_kind(BackendKind::MySql).quote_identifier("order"),
            "`order`"
        );
    }

    #[test]
    fn test_generic_escapes() {
        let generic = Backend::for_kind(BackendKind::Generic);
        assert_eq!(generic.escape_string(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(generic.escape_string("O'Brien"), r#"O\"Brien"#);
        assert_eq!(generic.escape_string("100%"), "100%%");
    }

    #[test]
    fn test_postgres_escapes_backslash_first() {
        let pg = Backend::for_kind(BackendKind::Postgres);
        assert_eq!(pg.escape_string(r"a\b"), r"a\\b");
        assert_eq!(pg.escape_string("it's"), r"it\'s");
        assert_eq!(pg.escape_string("a\nb\tc"), r"a\nb\tc");
        assert_eq!(pg.escape_string("50% ?"), r"50\045 \077");
        assert_eq!(pg.escape_string("nul\0"), r"nul\000");
    }

    #[test]
    fn test_postgres_uses_escape_string_syntax() {
        let pg = Backend::for_kind(BackendKind::Postgres);
        assert_eq!(pg.string_literal("Ann"), "'Ann'");
        assert_eq!(pg.string_literal("it's"), r"E'it\'s'");
        let mysql = Backend::for_kind(BackendKind::MySql);
        assert_eq!(mysql.string_literal("100%"), "'100%%'");
    }

    #[test]
    fn test_placeholders_and_limit_support() {
        assert_eq!(Backend::for_kind(BackendKind::Postgres).placeholder(), "%s");
        assert_eq!(Backend::for_kind(BackendKind::Gadfly).placeholder(), "?");
        assert!(!Backend::for_kind(BackendKind::Gadfly).supports_limit());
        assert!(Backend::for_kind(BackendKind::MySql).supports_limit());
    }

    #[test]
    fn test_postgres_encoding_table() {
        let pg = Backend::for_kind(BackendKind::Postgres);
        assert_eq!(pg.resolve_encoding("UTF8").unwrap(), TextEncoding::Utf8);
        assert_eq!(pg.resolve_encoding("LATIN1").unwrap(), TextEncoding::Latin1);
        assert_eq!(pg.resolve_encoding("LATIN9").unwrap(), TextEncoding::Latin9);
        assert!(!pg.resolve_encoding("EUC_JP").unwrap().is_supported());
        assert!(matches!(
            pg.resolve_encoding("KLINGON"),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_mysql_encoding_table() {
        let mysql = Backend::for_kind(BackendKind::MySql);
        assert_eq!(mysql.resolve_encoding("latin1").unwrap(), TextEncoding::Latin1);
        assert_eq!(mysql.resolve_encoding("utf8").unwrap(), TextEncoding::Utf8);
        assert_eq!(mysql.resolve_encoding("usa7").unwrap(), TextEncoding::Ascii);
    }

    #[test]
    fn test_table_less_backends_take_codec_names() {
        let gadfly = Backend::for_kind(BackendKind::Gadfly);
        assert_eq!(
            gadfly.resolve_encoding("iso-8859-1").unwrap(),
            TextEncoding::Latin1
        );
    }
}

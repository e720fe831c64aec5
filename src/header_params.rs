//! ヘッダー値のトークン/パラメータパース (RFC 2616 Section 3.6, 3.7)
//!
//! ## 概要
//!
//! `Content-Type` / `Accept` / `Transfer-Encoding` / `Content-Disposition` の値を
//! 先頭トークン (または `type/subtype`) と `; name=value` パラメータに分解します。
//!
//! ```text
//! header-value = token *( ";" parameter )
//! media-type   = type "/" subtype *( ";" parameter )
//! parameter    = attribute "=" value
//! attribute    = token
//! value        = token | quoted-string
//! ```
//!
//! パースはベストエフォートで、エラーは返しません。
//! パラメータは左から順に読み取り、最初にマッチしなかった位置で打ち切って残りは無視します。
//! 先頭トークン自体がマッチしない場合は生の値だけを持つ結果になります。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_multipart::header_params::HeaderParameters;
//!
//! let ct = HeaderParameters::parse("content-type", "multipart/form-data; boundary=----abc123");
//! assert_eq!(ct.media_type(), Some("multipart"));
//! assert_eq!(ct.subtype(), Some("form-data"));
//! assert_eq!(ct.boundary(), Some("----abc123"));
//!
//! let cd = HeaderParameters::parse(
//!     "content-disposition",
//!     "form-data; name=\"a b\"; filename=\"c.txt\"",
//! );
//! assert_eq!(cd.value(), Some("form-data"));
//! assert_eq!(cd.name(), Some("a b"));
//! assert_eq!(cd.filename(), Some("c.txt"));
//! ```

/// パース済みヘッダー値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderParameters {
    /// 生の値
    raw: String,
    /// 先頭トークン、または "type/subtype"
    value: Option<String>,
    /// メディアタイプ (content-type / accept のみ)
    media_type: Option<String>,
    /// サブタイプ (content-type / accept のみ)
    subtype: Option<String>,
    /// パラメータ (name, value) のペア
    parameters: Vec<(String, String)>,
}

/// ヘッダー名ごとの文法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    /// type "/" subtype
    MediaType,
    /// token
    Token,
}

impl Grammar {
    fn for_header(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "content-type" | "accept" => Some(Grammar::MediaType),
            "transfer-encoding" | "content-disposition" => Some(Grammar::Token),
            _ => None,
        }
    }
}

impl HeaderParameters {
    /// ヘッダー値をパース
    ///
    /// `header_name` は大文字小文字を区別しません。
    /// 構造化パースの対象外のヘッダー名は生の値だけを持つ結果を返します。
    pub fn parse(header_name: &str, raw: &str) -> Self {
        let mut out = HeaderParameters {
            raw: raw.to_string(),
            value: None,
            media_type: None,
            subtype: None,
            parameters: Vec::new(),
        };

        let Some(grammar) = Grammar::for_header(header_name) else {
            return out;
        };

        let mut cursor = Cursor::new(raw);
        match grammar {
            Grammar::MediaType => {
                let Some((media_type, subtype)) = cursor.media_type() else {
                    return out;
                };
                out.value = Some(format!("{}/{}", media_type, subtype));
                out.media_type = Some(media_type.to_string());
                out.subtype = Some(subtype.to_string());
            }
            Grammar::Token => {
                cursor.skip_lws();
                let Some(token) = cursor.token() else {
                    return out;
                };
                out.value = Some(token.to_string());
            }
        }

        while let Some((name, value)) = cursor.parameter() {
            out.insert_parameter(name, value);
        }

        out
    }

    fn insert_parameter(&mut self, name: &str, value: String) {
        match self.parameters.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.parameters.push((name.to_string(), value)),
        }
    }

    /// 生の値を取得
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 先頭トークン、または "type/subtype" を取得
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// メディアタイプを取得 (例: "multipart")
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// サブタイプを取得 (例: "form-data")
    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// 先頭トークンが読み取れたかどうか
    pub fn is_structured(&self) -> bool {
        self.value.is_some()
    }

    /// パラメータを取得
    ///
    /// 名前は出現したとおりに保持しているが、検索は大文字小文字を区別しない。
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| {
                self.parameters
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
            })
            .map(|(_, v)| v.as_str())
    }

    /// すべてのパラメータを取得
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// boundary パラメータを取得
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// name パラメータを取得
    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    /// filename パラメータを取得
    pub fn filename(&self) -> Option<&str> {
        self.parameter("filename")
    }

    /// 値が "type/subtype" と一致するか (大文字小文字を区別しない)
    pub fn is_media_type(&self, media_type: &str, subtype: &str) -> bool {
        matches!(
            (self.media_type(), self.subtype()),
            (Some(t), Some(s)) if t.eq_ignore_ascii_case(media_type) && s.eq_ignore_ascii_case(subtype)
        )
    }
}

/// 入力上の読み取り位置
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// LWS = [CRLF] 1*( SP | HT ) を読み飛ばす (省略可)
    fn skip_lws(&mut self) {
        loop {
            let rest = self.rest().as_bytes();
            if rest.starts_with(b"\r\n") && matches!(rest.get(2), Some(b' ' | b'\t')) {
                self.pos += 2;
            }
            let spaces = self
                .rest()
                .bytes()
                .take_while(|b| *b == b' ' || *b == b'\t')
                .count();
            if spaces == 0 {
                return;
            }
            self.pos += spaces;
        }
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.rest().as_bytes().first() == Some(&b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        let len = self.rest().bytes().take_while(|b| is_token_char(*b)).count();
        if len == 0 {
            return None;
        }
        let token = &self.rest()[..len];
        self.pos += len;
        Some(token)
    }

    fn media_type(&mut self) -> Option<(&'a str, &'a str)> {
        self.skip_lws();
        let media_type = self.token()?;
        self.skip_lws();
        if !self.eat(b'/') {
            return None;
        }
        self.skip_lws();
        let subtype = self.token()?;
        Some((media_type, subtype))
    }

    /// LWS ";" LWS token LWS "=" LWS ( quoted-string | token )
    ///
    /// マッチしなかった場合は読み取り位置を進めない。
    fn parameter(&mut self) -> Option<(&'a str, String)> {
        let mut attempt = *self;
        attempt.skip_lws();
        if !attempt.eat(b';') {
            return None;
        }
        attempt.skip_lws();
        let name = attempt.token()?;
        attempt.skip_lws();
        if !attempt.eat(b'=') {
            return None;
        }
        attempt.skip_lws();
        let value = if attempt.eat(b'"') {
            attempt.quoted_string()?
        } else {
            attempt.token()?.to_string()
        };
        *self = attempt;
        Some((name, value))
    }

    /// 開き引用符の直後から閉じ引用符までを読み取り、エスケープを解除する
    fn quoted_string(&mut self) -> Option<String> {
        let mut value = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Some(value);
                }
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    value.push(escaped);
                }
                c if is_qdtext(c) => value.push(c),
                _ => return None,
            }
        }
        None
    }
}

/// 引用符内で許可される文字 (HTAB / SP / VCHAR / obs-text)
fn is_qdtext(c: char) -> bool {
    c == '\t' || c == ' ' || c == '!' || ('#'..='~').contains(&c) || !c.is_ascii()
}

/// RFC 7230 のトークン文字
pub(crate) fn is_token_char(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'0'..=b'9' | b'A'..=b'Z' | b'^' | b'_' | b'`' | b'a'..=b'z' | b'|' | b'~'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multipart_content_type() {
        let h = HeaderParameters::parse("content-type", "multipart/form-data; boundary=----abc123");
        assert_eq!(h.media_type(), Some("multipart"));
        assert_eq!(h.subtype(), Some("form-data"));
        assert_eq!(h.value(), Some("multipart/form-data"));
        assert_eq!(h.parameter("boundary"), Some("----abc123"));
        assert!(h.is_media_type("Multipart", "Form-Data"));
    }

    #[test]
    fn test_parse_quoted_disposition() {
        let h = HeaderParameters::parse(
            "content-disposition",
            "form-data; name=\"a b\"; filename=\"c.txt\"",
        );
        assert_eq!(h.value(), Some("form-data"));
        assert_eq!(h.media_type(), None);
        assert_eq!(h.name(), Some("a b"));
        assert_eq!(h.filename(), Some("c.txt"));
    }

    #[test]
    fn test_header_name_case_insensitive() {
        let h = HeaderParameters::parse("Content-Type", "text/plain; charset=utf-8");
        assert_eq!(h.value(), Some("text/plain"));
        assert_eq!(h.parameter("charset"), Some("utf-8"));
    }

    #[test]
    fn test_unrecognized_header_is_raw_only() {
        let h = HeaderParameters::parse("x-custom", "foo; bar=baz");
        assert_eq!(h.raw(), "foo; bar=baz");
        assert!(!h.is_structured());
        assert!(h.parameters().is_empty());
    }

    #[test]
    fn test_primary_mismatch_is_raw_only() {
        let h = HeaderParameters::parse("content-type", "text; charset=utf-8");
        assert_eq!(h.raw(), "text; charset=utf-8");
        assert_eq!(h.value(), None);
        assert!(h.parameters().is_empty());

        let h = HeaderParameters::parse("content-disposition", "\"form-data\"");
        assert!(!h.is_structured());
    }

    #[test]
    fn test_lws_around_tokens() {
        let h = HeaderParameters::parse("accept", "  text /\thtml ;  q = 0.5");
        assert_eq!(h.value(), Some("text/html"));
        assert_eq!(h.parameter("q"), Some("0.5"));
    }

    #[test]
    fn test_folded_lws() {
        let h = HeaderParameters::parse("content-type", "text/plain;\r\n charset=utf-8");
        assert_eq!(h.parameter("charset"), Some("utf-8"));
    }

    #[test]
    fn test_stops_at_first_malformed_parameter() {
        let h = HeaderParameters::parse("content-type", "text/plain; a=1; broken; b=2");
        assert_eq!(h.parameter("a"), Some("1"));
        assert_eq!(h.parameter("b"), None);
        assert_eq!(h.parameters().len(), 1);
    }

    #[test]
    fn test_unterminated_quote_stops() {
        let h = HeaderParameters::parse("content-disposition", "form-data; name=\"x; filename=y");
        assert_eq!(h.value(), Some("form-data"));
        assert!(h.parameters().is_empty());
    }

    #[test]
    fn test_quoted_escape() {
        let h = HeaderParameters::parse(
            "content-disposition",
            "form-data; name=\"say \\\"hi\\\"\"; filename=\"a\\\\b\"",
        );
        assert_eq!(h.name(), Some("say \"hi\""));
        assert_eq!(h.filename(), Some("a\\b"));
    }

    #[test]
    fn test_quoted_utf8_filename() {
        let h = HeaderParameters::parse(
            "content-disposition",
            "form-data; name=\"f\"; filename=\"資料.txt\"",
        );
        assert_eq!(h.filename(), Some("資料.txt"));
    }

    #[test]
    fn test_quoted_control_char_stops() {
        let h = HeaderParameters::parse("content-disposition", "form-data; name=\"a\u{1}b\"");
        assert_eq!(h.name(), None);
    }

    #[test]
    fn test_parameter_name_preserved() {
        let h = HeaderParameters::parse("content-type", "multipart/form-data; Boundary=XyZ");
        assert_eq!(h.parameters()[0].0, "Boundary");
        assert_eq!(h.boundary(), Some("XyZ"));
    }

    #[test]
    fn test_duplicate_parameter_last_wins() {
        let h = HeaderParameters::parse("content-type", "text/plain; a=1; a=2");
        assert_eq!(h.parameter("a"), Some("2"));
        assert_eq!(h.parameters().len(), 1);
    }

    #[test]
    fn test_transfer_encoding() {
        let h = HeaderParameters::parse("transfer-encoding", "chunked");
        assert_eq!(h.value(), Some("chunked"));
        assert_eq!(h.media_type(), None);
    }

    #[test]
    fn test_trailing_garbage_ignored() {
        let h = HeaderParameters::parse("content-type", "text/html; charset=utf-8 garbage");
        assert_eq!(h.value(), Some("text/html"));
        assert_eq!(h.parameter("charset"), Some("utf-8"));
    }

    #[test]
    fn test_token_char() {
        assert!(is_token_char(b'a'));
        assert!(is_token_char(b'-'));
        assert!(!is_token_char(b','));
        assert!(!is_token_char(b'"'));
        assert!(!is_token_char(b' '));
    }
}

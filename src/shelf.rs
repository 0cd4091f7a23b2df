//! Shelf retrieval and defensive XML parsing.
//!
//! Pulls the user's "to-read" shelf page by page and converts the
//! service's review XML into canonical [`Book`] values. Individual
//! malformed entries are skipped; a document whose root structure is
//! unrecognizable fails the whole call.

use crate::config::Config;
use crate::fetch::HttpClient;
use crate::types::{Book, UpstreamError, UpstreamResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, warn};
use url::Url;

/// Placeholder marker the shelf service uses when it has no licensed
/// cover image for a book.
const NO_PHOTO_MARKER: &str = "nophoto";

/// Cover fallback host, keyed by ISBN. Medium size.
const COVER_FALLBACK_BASE: &str = "https://covers.openlibrary.org/b/isbn";

/// Fetch the full "to-read" shelf for a user.
///
/// Pages are requested sequentially from page 1; the loop stops at the
/// first page that yields zero parsed books, or at the configured page
/// ceiling. Books come back in page order.
pub async fn fetch_shelf(
    client: &HttpClient,
    config: &Config,
    user_id: &str,
) -> UpstreamResult<Vec<Book>> {
    let mut books = Vec::new();

    for page in 1..=config.max_pages {
        let url = shelf_page_url(config, user_id, page)?;
        debug!(user_id, page, "requesting shelf page");
        let body = client.get(url.as_str()).await?;

        let page_books = parse_shelf_page(&body)?;
        if page_books.is_empty() {
            break;
        }
        books.extend(page_books);
    }

    info!(user_id, count = books.len(), "fetched shelf");
    Ok(books)
}

fn shelf_page_url(config: &Config, user_id: &str, page: u32) -> UpstreamResult<Url> {
    let base = format!("{}/review/list", config.shelf_base_url);
    Url::parse_with_params(
        &base,
        &[
            ("v", "2"),
            ("id", user_id),
            ("shelf", "to-read"),
            ("format", "xml"),
            ("page", &page.to_string()),
            ("per_page", &config.per_page.to_string()),
            ("key", &config.shelf_api_key),
        ],
    )
    .map_err(|e| UpstreamError::Parse(format!("bad shelf URL: {e}")))
}

/// Book fields accumulated while walking one `<book>` element.
#[derive(Default)]
struct BookBuilder {
    title: String,
    isbn: String,
    isbn13: String,
    author: String,
    link: String,
    image_url: String,
}

impl BookBuilder {
    /// Finalize into a `Book`, or `None` for an entry with nothing to
    /// identify it by (both title and ISBN empty).
    fn build(self) -> Option<Book> {
        if self.title.is_empty() && self.isbn.is_empty() {
            return None;
        }
        let cover_image_url = resolve_cover_url(&self.image_url, &self.isbn);
        Some(Book {
            title: self.title,
            isbn: self.isbn,
            isbn13: self.isbn13,
            author: self.author,
            source_url: self.link,
            cover_image_url,
        })
    }
}

/// Rewrite placeholder or missing cover URLs to the ISBN-keyed fallback.
///
/// The shelf service serves a "nophoto" placeholder for covers it cannot
/// distribute; those are as good as missing. With no ISBN there is
/// nothing to key the fallback on, so the cover stays `None`.
fn resolve_cover_url(image_url: &str, isbn: &str) -> Option<String> {
    if !image_url.is_empty() && !image_url.contains(NO_PHOTO_MARKER) {
        return Some(image_url.to_string());
    }
    if isbn.is_empty() {
        return None;
    }
    Some(format!("{COVER_FALLBACK_BASE}/{isbn}-M.jpg"))
}

/// Parse one shelf page document into books.
///
/// The document root must be `GoodreadsResponse`; anything else is a
/// parse failure for the whole page. Inside it, every field access is
/// defensive: `nil`-marked elements count as absent, a review without
/// an embedded book is skipped, siblings are unaffected.
pub fn parse_shelf_page(xml: &str) -> UpstreamResult<Vec<Book>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut books = Vec::new();
    let mut saw_root = false;
    let mut in_review = false;
    let mut in_authors = false;
    let mut depth_in_book = 0u32;
    let mut current: Option<BookBuilder> = None;
    let mut current_tag = String::new();
    let mut current_nil = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                current_nil = is_nil(&e);
                match name.as_str() {
                    "GoodreadsResponse" => saw_root = true,
                    "review" => in_review = true,
                    "book" if in_review => {
                        depth_in_book = 1;
                        current = Some(BookBuilder::default());
                        current_tag.clear();
                    }
                    "authors" if depth_in_book > 0 => {
                        depth_in_book += 1;
                        in_authors = true;
                    }
                    _ if depth_in_book > 0 => {
                        depth_in_book += 1;
                        current_tag = name;
                    }
                    _ => {}
                }
            }
            // Self-closing elements carry no text; nothing to record
            // whether nil-marked or merely empty.
            Ok(Event::Empty(_)) => {}
            Ok(Event::Text(e)) => {
                if depth_in_book > 0 && !current_nil {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    record_field(&mut current, in_authors, &current_tag, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if depth_in_book > 0 && !current_nil {
                    let text = String::from_utf8_lossy(&e).trim().to_string();
                    record_field(&mut current, in_authors, &current_tag, &text);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "review" => {
                        in_review = false;
                        match current.take().and_then(BookBuilder::build) {
                            Some(book) => books.push(book),
                            None => debug!("skipping shelf entry with no usable book record"),
                        }
                    }
                    "authors" => {
                        in_authors = false;
                        depth_in_book = depth_in_book.saturating_sub(1);
                    }
                    "book" if depth_in_book == 1 => depth_in_book = 0,
                    _ if depth_in_book > 0 => {
                        depth_in_book = depth_in_book.saturating_sub(1);
                        current_tag.clear();
                    }
                    _ => {}
                }
                current_nil = false;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "shelf document failed to parse");
                return Err(UpstreamError::Parse(format!("malformed shelf XML: {e}")));
            }
        }
        buf.clear();
    }

    if !saw_root {
        return Err(UpstreamError::Parse(
            "shelf document missing GoodreadsResponse root".to_string(),
        ));
    }

    Ok(books)
}

/// Whether an element is explicitly marked absent (`nil="true"`).
fn is_nil(e: &quick_xml::events::BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|a| {
        a.key.local_name().as_ref() == b"nil" && a.value.as_ref() == b"true"
    })
}

fn record_field(current: &mut Option<BookBuilder>, in_authors: bool, tag: &str, text: &str) {
    let Some(b) = current.as_mut() else { return };
    if text.is_empty() {
        return;
    }
    if in_authors {
        // First listed author only.
        if tag == "name" && b.author.is_empty() {
            b.author = text.to_string();
        }
        return;
    }
    match tag {
        "title" => b.title = text.to_string(),
        "isbn" => b.isbn = text.to_string(),
        "isbn13" => b.isbn13 = text.to_string(),
        "image_url" => b.image_url = text.to_string(),
        "link" => b.link = text.to_string(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_xml(inner: &str) -> String {
        format!("<GoodreadsResponse><reviews>{inner}</reviews></GoodreadsResponse>")
    }

    const FULL_BOOK: &str = r#"
        <review>
          <book>
            <title>The Left Hand of Darkness</title>
            <isbn>0441478123</isbn>
            <isbn13>9780441478125</isbn13>
            <image_url>https://images.shelf.example/books/12345.jpg</image_url>
            <link><![CDATA[https://shelf.example/book/show/18423]]></link>
            <authors>
              <author><name>Ursula K. Le Guin</name></author>
              <author><name>Someone Else</name></author>
            </authors>
          </book>
        </review>"#;

    #[test]
    fn test_parse_full_book() {
        let books = parse_shelf_page(&review_xml(FULL_BOOK)).unwrap();
        assert_eq!(books.len(), 1);
        let b = &books[0];
        assert_eq!(b.title, "The Left Hand of Darkness");
        assert_eq!(b.isbn, "0441478123");
        assert_eq!(b.isbn13, "9780441478125");
        assert_eq!(b.author, "Ursula K. Le Guin");
        assert_eq!(b.source_url, "https://shelf.example/book/show/18423");
        assert_eq!(
            b.cover_image_url.as_deref(),
            Some("https://images.shelf.example/books/12345.jpg")
        );
    }

    #[test]
    fn test_nil_isbn_is_absent() {
        let xml = review_xml(
            r#"<review><book>
                <title>Mystery Title</title>
                <isbn nil="true"></isbn>
                <image_url>https://images.shelf.example/nophoto/111.jpg</image_url>
            </book></review>"#,
        );
        let books = parse_shelf_page(&xml).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].isbn, "");
        // Placeholder cover with no ISBN to fall back on: no cover.
        assert_eq!(books[0].cover_image_url, None);
    }

    #[test]
    fn test_placeholder_cover_rewritten_via_isbn() {
        let xml = review_xml(
            r#"<review><book>
                <title>A Fire Upon the Deep</title>
                <isbn>0553380966</isbn>
                <image_url>https://images.shelf.example/nophoto/blank.png</image_url>
            </book></review>"#,
        );
        let books = parse_shelf_page(&xml).unwrap();
        assert_eq!(
            books[0].cover_image_url.as_deref(),
            Some("https://covers.openlibrary.org/b/isbn/0553380966-M.jpg")
        );
    }

    #[test]
    fn test_review_without_book_skipped() {
        let xml = review_xml(&format!(
            "<review><rating>5</rating></review>{FULL_BOOK}"
        ));
        let books = parse_shelf_page(&xml).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "The Left Hand of Darkness");
    }

    #[test]
    fn test_entry_with_no_title_and_no_isbn_dropped() {
        let xml = review_xml(
            r#"<review><book><image_url>https://x.example/a.jpg</image_url></book></review>"#,
        );
        let books = parse_shelf_page(&xml).unwrap();
        assert!(books.is_empty());
    }

    #[test]
    fn test_missing_root_is_parse_error() {
        let err = parse_shelf_page("<SomethingElse></SomethingElse>").unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err =
            parse_shelf_page("<GoodreadsResponse><reviews></review></GoodreadsResponse>")
                .unwrap_err();
        assert!(matches!(err, UpstreamError::Parse(_)));
    }

    #[test]
    fn test_review_link_does_not_clobber_book_link() {
        let xml = review_xml(
            r#"<review>
                <book>
                  <title>Solaris</title>
                  <link>https://shelf.example/book/show/95558</link>
                </book>
                <link>https://shelf.example/review/show/777</link>
            </review>"#,
        );
        let books = parse_shelf_page(&xml).unwrap();
        assert_eq!(books[0].source_url, "https://shelf.example/book/show/95558");
    }

    #[test]
    fn test_books_in_document_order() {
        let xml = review_xml(
            r#"<review><book><title>First</title></book></review>
               <review><book><title>Second</title></book></review>"#,
        );
        let books = parse_shelf_page(&xml).unwrap();
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }
}

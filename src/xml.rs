//! Pure string builders for the handful of XML bodies this server
//! returns. No templating engine: these are built by hand with
//! `push_str`, and a dozen small responses don't earn one.

use chrono::{DateTime, Utc};

use crate::storage::{Bucket, ListOptions, ListResult};

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn build_buckets(buckets: &[Bucket]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("\n<ListAllMyBucketsResult>");
    xml.push_str("\n  <Owner>");
    xml.push_str("\n    <ID>rustbucket</ID>");
    xml.push_str("\n    <DisplayName>rustbucket</DisplayName>");
    xml.push_str("\n  </Owner>");
    xml.push_str("\n  <Buckets>");
    for bucket in buckets {
        xml.push_str(&format!(
            "\n    <Bucket>\n      <Name>{}</Name>\n      <CreationDate>{}</CreationDate>\n    </Bucket>",
            escape(&bucket.name),
            bucket.creation_date.to_rfc3339(),
        ));
    }
    xml.push_str("\n  </Buckets>");
    xml.push_str("\n</ListAllMyBucketsResult>");
    xml
}

pub fn build_bucket_query(bucket: &str, opts: &ListOptions, result: &ListResult) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("\n<ListBucketResult>");
    xml.push_str(&format!("\n  <Name>{}</Name>", escape(bucket)));
    xml.push_str(&format!(
        "\n  <Prefix>{}</Prefix>",
        opts.prefix.as_deref().map(escape).unwrap_or_default()
    ));
    xml.push_str(&format!(
        "\n  <Marker>{}</Marker>",
        opts.marker.as_deref().map(escape).unwrap_or_default()
    ));
    if let Some(delimiter) = &opts.delimiter {
        xml.push_str(&format!("\n  <Delimiter>{}</Delimiter>", escape(delimiter)));
    }
    xml.push_str(&format!("\n  <MaxKeys>{}</MaxKeys>", opts.max_keys));
    xml.push_str(&format!("\n  <IsTruncated>{}</IsTruncated>", result.is_truncated));

    for object in &result.objects {
        xml.push_str("\n  <Contents>");
        xml.push_str(&format!("\n    <Key>{}</Key>", escape(&object.key)));
        xml.push_str(&format!(
            "\n    <LastModified>{}</LastModified>",
            object.modified.to_rfc3339()
        ));
        xml.push_str(&format!("\n    <ETag>\"{}\"</ETag>", object.md5));
        xml.push_str(&format!("\n    <Size>{}</Size>", object.size));
        xml.push_str("\n    <StorageClass>STANDARD</StorageClass>");
        xml.push_str("\n  </Contents>");
    }

    for prefix in &result.common_prefixes {
        xml.push_str("\n  <CommonPrefixes>");
        xml.push_str(&format!("\n    <Prefix>{}</Prefix>", escape(prefix)));
        xml.push_str("\n  </CommonPrefixes>");
    }

    xml.push_str("\n</ListBucketResult>");
    xml
}

pub fn build_error(code: &str, message: &str, resource: &str) -> String {
    format!(
        "{}\n<Error>\n  <Code>{}</Code>\n  <Message>{}</Message>\n  <Resource>{}</Resource>\n</Error>",
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        escape(code),
        escape(message),
        escape(resource),
    )
}

pub fn build_acl() -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("\n<AccessControlPolicy>");
    xml.push_str("\n  <Owner>");
    xml.push_str("\n    <ID>rustbucket</ID>");
    xml.push_str("\n    <DisplayName>rustbucket</DisplayName>");
    xml.push_str("\n  </Owner>");
    xml.push_str("\n  <AccessControlList>");
    xml.push_str("\n    <Grant>");
    xml.push_str("\n      <Grantee xsi:type=\"CanonicalUser\">");
    xml.push_str("\n        <ID>rustbucket</ID>");
    xml.push_str("\n        <DisplayName>rustbucket</DisplayName>");
    xml.push_str("\n      </Grantee>");
    xml.push_str("\n      <Permission>FULL_CONTROL</Permission>");
    xml.push_str("\n    </Grant>");
    xml.push_str("\n  </AccessControlList>");
    xml.push_str("\n</AccessControlPolicy>");
    xml
}

pub fn build_copy_object(md5: &str, modified: DateTime<Utc>) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("\n<CopyObjectResult>");
    xml.push_str(&format!("\n  <LastModified>{}</LastModified>", modified.to_rfc3339()));
    xml.push_str(&format!("\n  <ETag>\"{}\"</ETag>", md5));
    xml.push_str("\n</CopyObjectResult>");
    xml
}

pub fn build_objects_deleted(keys: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str("\n<DeleteResult>");
    for key in keys {
        xml.push_str(&format!("\n  <Deleted>\n    <Key>{}</Key>\n  </Deleted>", escape(key)));
    }
    xml.push_str("\n</DeleteResult>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_carries_code_message_and_resource() {
        let xml = build_error("NoSuchKey", "The specified key does not exist.", "a/b.txt");
        assert!(xml.contains("<Code>NoSuchKey</Code>"));
        assert!(xml.contains("<Resource>a/b.txt</Resource>"));
    }

    #[test]
    fn escapes_reserved_characters_in_keys() {
        let xml = build_error("NoSuchKey", "msg", "a&b<c>");
        assert!(xml.contains("a&amp;b&lt;c&gt;"));
    }

    #[test]
    fn deleted_batch_lists_every_key() {
        let xml = build_objects_deleted(&["a".to_string(), "b".to_string()]);
        assert_eq!(xml.matches("<Deleted>").count(), 2);
    }
}

//! Single-pass field extraction over a flat token list.
//!
//! Only keys that belong directly to the object being read are matched, so a
//! nested `"name"` (for example inside `namespace`) never overwrites the
//! project's own name. Unknown keys are skipped, which keeps extraction working
//! when GitLab adds fields.

use crate::error::{GlFetchError, Result};
use crate::tokens::{Token, TokenBuffer, TokenKind};

use super::types::{Pipeline, Project};

/// Fills `name` and `path_with_namespace` from a project metadata response.
///
/// # Errors
///
/// Returns [`GlFetchError::MalformedResponse`] when the buffer does not
/// tokenize or its root is not an object. No field is touched in that case.
pub fn extract_project(project: &mut Project, tokens: &mut TokenBuffer) -> Result<()> {
    let id = project.id();
    let input = project.buffer.as_slice();
    let tokens = tokens
        .tokenize(input)
        .map_err(|e| GlFetchError::tokenize(id, &e))?;
    expect_root(id, tokens, TokenKind::Object)?;

    let mut i = 1;
    while i < tokens.len() {
        let key = &tokens[i];
        if key.kind != TokenKind::String || key.parent != Some(0) {
            i += 1;
            continue;
        }

        let field = match key.raw(input) {
            b"name" => &mut project.name,
            b"path_with_namespace" => &mut project.path_with_namespace,
            _ => {
                i += 1;
                continue;
            }
        };
        if let Some(value) = tokens.get(i + 1).and_then(|v| text(input, v)) {
            *field = value;
        }
        i += 2;
    }

    Ok(())
}

/// Rebuilds the project's pipelines from a pipeline list response.
///
/// Each object directly inside the root array becomes one [`Pipeline`], in
/// array order. The new list replaces the old one only when the whole response
/// was read, so running this twice on the same buffer never duplicates
/// pipelines and a malformed entry leaves the previous list untouched.
///
/// # Errors
///
/// Returns [`GlFetchError::MalformedResponse`] when the root is not an array
/// and [`GlFetchError::MalformedChild`] when a pipeline `id` is not an integer.
pub fn extract_pipelines(project: &mut Project, tokens: &mut TokenBuffer) -> Result<usize> {
    let id = project.id();
    let input = project.buffer.as_slice();
    let tokens = tokens
        .tokenize(input)
        .map_err(|e| GlFetchError::tokenize(id, &e))?;
    let root = expect_root(id, tokens, TokenKind::Array)?;

    let mut pipelines: Vec<Pipeline> = Vec::with_capacity(root.size);
    let mut current = None;

    let mut i = 1;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.kind == TokenKind::Object && token.parent == Some(0) {
            pipelines.push(Pipeline::default());
            current = Some(i);
            i += 1;
            continue;
        }

        let index = pipelines.len().saturating_sub(1);
        let (Some(object), Some(pipeline)) = (current, pipelines.last_mut()) else {
            i += 1;
            continue;
        };
        if token.kind != TokenKind::String || token.parent != Some(object) {
            i += 1;
            continue;
        }

        let value = tokens.get(i + 1);
        let field = match token.raw(input) {
            b"id" => {
                pipeline.id = parse_id(input, value).map_err(|reason| {
                    GlFetchError::MalformedChild {
                        project_id: id,
                        index,
                        reason,
                    }
                })?;
                i += 2;
                continue;
            }
            b"ref" => &mut pipeline.ref_,
            b"web_url" => &mut pipeline.web_url,
            b"created_at" => &mut pipeline.created_at,
            b"updated_at" => &mut pipeline.updated_at,
            b"status" => &mut pipeline.status,
            _ => {
                i += 1;
                continue;
            }
        };
        if let Some(value) = value.and_then(|v| text(input, v)) {
            *field = value;
        }
        i += 2;
    }

    let count = pipelines.len();
    project.pipelines = pipelines;
    Ok(count)
}

fn expect_root<'t>(project_id: i64, tokens: &'t [Token], kind: TokenKind) -> Result<&'t Token> {
    match tokens.first() {
        Some(root) if root.kind == kind => Ok(root),
        Some(root) => Err(GlFetchError::malformed(
            project_id,
            format!("expected {kind:?} at root, found {:?}", root.kind),
        )),
        None => Err(GlFetchError::malformed(project_id, "empty response")),
    }
}

/// String value of a member; `None` for `null` and containers.
fn text(input: &[u8], value: &Token) -> Option<String> {
    match value.kind {
        TokenKind::String => Some(value.unescaped(input)),
        TokenKind::Primitive if !value.is_null(input) => {
            Some(String::from_utf8_lossy(value.raw(input)).into_owned())
        }
        _ => None,
    }
}

fn parse_id(input: &[u8], value: Option<&Token>) -> std::result::Result<i64, String> {
    let value = value.ok_or_else(|| "missing id value".to_string())?;
    if value.kind != TokenKind::Primitive {
        return Err(format!("expected a primitive id, found {:?}", value.kind));
    }

    std::str::from_utf8(value.raw(input))
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| {
            format!(
                "id {} is not a base-10 integer",
                String::from_utf8_lossy(value.raw(input))
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn project(body: &str) -> Project {
        let url = Url::parse("https://gitlab.example.com/api/v4/projects/42").unwrap();
        let mut project = Project::new(42, url.clone(), url);
        project.buffer = body.as_bytes().to_vec();
        project
    }

    fn ids(project: &Project) -> Vec<i64> {
        project.pipelines.iter().map(|p| p.id).collect()
    }

    mod object_mode {
        use super::*;

        #[test]
        fn test_extracts_name_and_path() {
            let mut project = project(r#"{"name":"n","path_with_namespace":"p"}"#);
            extract_project(&mut project, &mut TokenBuffer::default()).unwrap();

            assert_eq!(project.name, "n");
            assert_eq!(project.path_with_namespace, "p");
            assert_eq!(project.id(), 42);
        }

        #[test]
        fn test_ignores_unknown_and_nested_keys() {
            let body = r#"{
                "id": 42,
                "description": "name",
                "name": "Inkscape",
                "tag_list": ["name", "path_with_namespace"],
                "path_with_namespace": "inkscape/inkscape",
                "namespace": {"name": "Inkscape Group", "path_with_namespace": "nope"},
                "star_count": 300
            }"#;
            let mut project = project(body);
            extract_project(&mut project, &mut TokenBuffer::default()).unwrap();

            assert_eq!(project.name, "Inkscape");
            assert_eq!(project.path_with_namespace, "inkscape/inkscape");
        }

        #[test]
        fn test_value_equal_to_key_name_is_not_a_key() {
            let mut project = project(r#"{"description":"name","name":"real"}"#);
            extract_project(&mut project, &mut TokenBuffer::default()).unwrap();
            assert_eq!(project.name, "real");
        }

        #[test]
        fn test_unescapes_values() {
            let mut project = project(r#"{"name":"Café \"beta\"","path_with_namespace":"a\/b"}"#);
            extract_project(&mut project, &mut TokenBuffer::default()).unwrap();
            assert_eq!(project.name, "Caf\u{e9} \"beta\"");
            assert_eq!(project.path_with_namespace, "a/b");
        }

        #[test]
        fn test_null_value_leaves_field_unchanged() {
            let mut project = project(r#"{"name":null,"path_with_namespace":"p"}"#);
            project.name = "kept".to_string();
            extract_project(&mut project, &mut TokenBuffer::default()).unwrap();
            assert_eq!(project.name, "kept");
            assert_eq!(project.path_with_namespace, "p");
        }

        #[test]
        fn test_non_object_roots_leave_fields_untouched() {
            for body in ["[]", r#"{"name": "trunc"#, "", "42"] {
                let mut project = project(body);
                project.name = "before".to_string();

                let err = extract_project(&mut project, &mut TokenBuffer::default()).unwrap_err();

                assert!(
                    matches!(err, GlFetchError::MalformedResponse { project_id: 42, .. }),
                    "unexpected error for {body:?}: {err}"
                );
                assert_eq!(project.name, "before");
                assert!(project.path_with_namespace.is_empty());
            }
        }

        #[test]
        fn test_token_capacity_exceeded_is_malformed() {
            let mut project = project(r#"{"name":"n","path_with_namespace":"p"}"#);
            let err = extract_project(&mut project, &mut TokenBuffer::with_capacity(2)).unwrap_err();
            assert!(err.to_string().contains("more than 2 tokens"));
            assert!(project.name.is_empty());
        }

        #[test]
        fn test_repeated_extraction_is_last_write_wins() {
            let mut project = project(r#"{"name":"n","path_with_namespace":"p"}"#);
            let mut tokens = TokenBuffer::default();
            extract_project(&mut project, &mut tokens).unwrap();
            extract_project(&mut project, &mut tokens).unwrap();

            assert_eq!(project.name, "n");
            assert_eq!(project.path_with_namespace, "p");
        }
    }

    mod array_mode {
        use super::*;

        #[test]
        fn test_creates_one_pipeline_per_object_in_order() {
            let mut project = project(r#"[{"id": 300}, {"id": 100}, {"id": 200}]"#);
            let count = extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap();

            assert_eq!(count, 3);
            assert_eq!(ids(&project), vec![300, 100, 200]);
        }

        #[test]
        fn test_maps_all_pipeline_fields() {
            let body = r#"[{
                "id": 1127,
                "iid": 9,
                "project_id": 42,
                "sha": "a91957a858320c0e17f3a0eca7cfacbff50ea29a",
                "ref": "main",
                "status": "success",
                "source": "push",
                "created_at": "2024-06-05T09:11:19.433Z",
                "updated_at": "2024-06-05T09:31:02.125Z",
                "web_url": "https://gitlab.example.com/group/project/-/pipelines/1127"
            }]"#;
            let mut project = project(body);
            extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap();

            assert_eq!(
                project.pipelines,
                vec![Pipeline {
                    id: 1127,
                    ref_: "main".to_string(),
                    web_url: "https://gitlab.example.com/group/project/-/pipelines/1127"
                        .to_string(),
                    created_at: "2024-06-05T09:11:19.433Z".to_string(),
                    updated_at: "2024-06-05T09:31:02.125Z".to_string(),
                    status: "success".to_string(),
                }]
            );
        }

        #[test]
        fn test_nested_objects_do_not_start_pipelines() {
            let body = r#"[
                {"id": 1, "user": {"id": 77, "name": "bot"}, "status": "failed"},
                {"id": 2, "detailed_status": {"id": 88}}
            ]"#;
            let mut project = project(body);
            extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap();

            assert_eq!(ids(&project), vec![1, 2]);
            assert_eq!(project.pipelines[0].status, "failed");
        }

        #[test]
        fn test_empty_array_clears_pipelines() {
            let mut project = project("[]");
            project.pipelines.push(Pipeline::default());
            let count = extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap();

            assert_eq!(count, 0);
            assert!(project.pipelines.is_empty());
        }

        #[test]
        fn test_object_root_is_malformed() {
            let mut project = project(r#"{"message":"404 Project Not Found"}"#);
            project.pipelines.push(Pipeline {
                id: 5,
                ..Pipeline::default()
            });

            let err = extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap_err();

            assert!(matches!(err, GlFetchError::MalformedResponse { .. }));
            assert_eq!(ids(&project), vec![5]);
        }

        #[test]
        fn test_non_primitive_id_aborts_without_partial_children() {
            let body = r#"[{"id": 1}, {"id": "two"}, {"id": 3}]"#;
            let mut project = project(body);
            project.pipelines.push(Pipeline {
                id: 99,
                ..Pipeline::default()
            });

            let err = extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap_err();

            assert!(matches!(
                err,
                GlFetchError::MalformedChild {
                    project_id: 42,
                    index: 1,
                    ..
                }
            ));
            assert_eq!(ids(&project), vec![99]);
        }

        #[test]
        fn test_non_integer_id_is_malformed_child() {
            let mut project = project(r#"[{"id": 1.5}]"#);
            let err = extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap_err();
            assert!(err.to_string().contains("not a base-10 integer"));
        }

        #[test]
        fn test_re_extraction_does_not_duplicate() {
            let mut project = project(r#"[{"id": 1}, {"id": 2}]"#);
            let mut tokens = TokenBuffer::default();
            extract_pipelines(&mut project, &mut tokens).unwrap();
            extract_pipelines(&mut project, &mut tokens).unwrap();

            assert_eq!(ids(&project), vec![1, 2]);
        }

        #[test]
        fn test_skips_non_object_elements() {
            let mut project = project(r#"[1, {"id": 4}, "x", null]"#);
            extract_pipelines(&mut project, &mut TokenBuffer::default()).unwrap();
            assert_eq!(ids(&project), vec![4]);
        }
    }
}

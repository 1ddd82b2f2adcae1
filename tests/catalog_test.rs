//! Tests for ResourceCatalog traversal and shared-link annotation.

use box_catalog::{
    annotate_shared_links, filter_by_extension, AccessToken, AuthorizedFetcher, CatalogOptions,
    Endpoints, ExtensionSet, FetchError, ResourceCatalog, SHARED_LINK_FAILED,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

fn fetcher(server: &ServerGuard) -> AuthorizedFetcher {
    AuthorizedFetcher::new(AccessToken::new("tok"), &Endpoints::from_base(&server.url()))
}

fn file(id: &str, name: &str, parent: &str) -> Value {
    json!({
        "type": "file",
        "id": id,
        "name": name,
        "parent": {"type": "folder", "id": parent},
        "created_at": "2024-05-01T09:30:00-07:00"
    })
}

fn folder(id: &str, name: &str) -> Value {
    json!({"type": "folder", "id": id, "name": name})
}

async fn mock_folder(server: &mut ServerGuard, folder_id: &str, entries: Vec<Value>) -> Mock {
    let body = json!({
        "total_count": entries.len(),
        "offset": 0,
        "limit": 1000,
        "entries": entries
    });
    server
        .mock("GET", format!("/folders/{}/items", folder_id).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

fn names(entries: &[box_catalog::FileEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

mod traversal {
    use super::*;

    #[tokio::test]
    async fn images_in_traversal_order() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![file("1", "a.jpg", "0"), file("2", "b.txt", "0"), folder("10", "sub")],
        )
        .await;
        let _m = mock_folder(&mut server, "10", vec![file("3", "c.png", "10")]).await;

        let fetcher = fetcher(&server);
        let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();

        assert_eq!(names(&catalog), vec!["a.jpg", "b.txt", "c.png"]);
        assert_eq!(catalog[2].parent_folder_id, "10");

        let images = filter_by_extension(&catalog, &ExtensionSet::new([".jpg", ".png", ".gif"]));
        assert_eq!(names(&images), vec!["a.jpg", "c.png"]);
    }

    #[tokio::test]
    async fn subfolder_contents_keep_their_position() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![folder("10", "first"), file("1", "root.jpg", "0"), folder("20", "second")],
        )
        .await;
        let _m = mock_folder(
            &mut server,
            "10",
            vec![file("2", "one.jpg", "10"), folder("11", "nested")],
        )
        .await;
        let _m = mock_folder(&mut server, "11", vec![file("3", "deep.jpg", "11")]).await;
        let _m = mock_folder(&mut server, "20", vec![file("4", "two.jpg", "20")]).await;

        let fetcher = fetcher(&server);
        let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();

        assert_eq!(
            names(&catalog),
            vec!["one.jpg", "deep.jpg", "root.jpg", "two.jpg"]
        );
        assert!(catalog.iter().all(|e| !e.is_folder()));
    }

    #[tokio::test]
    async fn cycles_and_duplicates_are_ignored() {
        let mut server = Server::new_async().await;
        let root = mock_folder(&mut server, "0", vec![file("1", "a.jpg", "0"), folder("10", "sub")]).await;
        let sub = mock_folder(
            &mut server,
            "10",
            vec![folder("0", "All Files"), folder("11", "loop"), file("1", "a.jpg", "0")],
        )
        .await;
        let looped = mock_folder(
            &mut server,
            "11",
            vec![folder("10", "sub"), file("2", "d.gif", "11")],
        )
        .await;

        let fetcher = fetcher(&server);
        let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();

        assert_eq!(names(&catalog), vec!["a.jpg", "d.gif"]);
        root.assert_async().await;
        sub.assert_async().await;
        looped.assert_async().await;
    }

    #[tokio::test]
    async fn returns_exactly_the_reachable_files() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![file("1", "a.jpg", "0"), folder("10", "x"), folder("20", "y")],
        )
        .await;
        let _m = mock_folder(
            &mut server,
            "10",
            vec![file("2", "b.png", "10"), file("3", "c.txt", "10"), folder("20", "y")],
        )
        .await;
        let _m = mock_folder(
            &mut server,
            "20",
            vec![file("4", "d.gif", "20"), file("2", "b.png", "10")],
        )
        .await;
        let unreachable = server
            .mock("GET", "/folders/99/items")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher(&server);
        let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();

        let mut ids: Vec<&str> = catalog.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
        unreachable.assert_async().await;
    }

    #[tokio::test]
    async fn depth_cap_stops_descent() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(&mut server, "0", vec![file("1", "top.jpg", "0"), folder("10", "l1")]).await;
        let _m = mock_folder(&mut server, "10", vec![file("2", "mid.jpg", "10"), folder("11", "l2")]).await;
        let too_deep = server
            .mock("GET", "/folders/11/items")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let fetcher = fetcher(&server);
        let options = CatalogOptions {
            max_depth: 1,
            ..CatalogOptions::default()
        };
        let catalog = ResourceCatalog::new(&fetcher, options).build("0").await.unwrap();

        assert_eq!(names(&catalog), vec!["top.jpg", "mid.jpg"]);
        too_deep.assert_async().await;
    }

    #[tokio::test]
    async fn web_links_are_skipped() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![
                json!({"type": "web_link", "id": "5", "name": "bookmark"}),
                file("1", "a.jpg", "0"),
            ],
        )
        .await;

        let fetcher = fetcher(&server);
        let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();

        assert_eq!(names(&catalog), vec!["a.jpg"]);
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn root_listing_failure_aborts() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/folders/0/items")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let fetcher = fetcher(&server);
        let result = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await;

        assert!(matches!(
            result,
            Err(FetchError::RequestFailed { status_code: 401, .. })
        ));
    }

    #[tokio::test]
    async fn subfolder_failure_skips_only_that_subtree() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![folder("10", "locked"), file("1", "a.jpg", "0")],
        )
        .await;
        let _m = server
            .mock("GET", "/folders/10/items")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let fetcher = fetcher(&server);
        let catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();

        assert_eq!(names(&catalog), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn metadata_is_fetched_per_file_and_failures_keep_listing_data() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![
                json!({"type": "file", "id": "1", "name": "a.jpg"}),
                json!({"type": "file", "id": "2", "name": "b.jpg"}),
            ],
        )
        .await;
        let _m = server
            .mock("GET", "/files/1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "type": "file",
                    "id": "1",
                    "name": "a.jpg",
                    "parent": {"type": "folder", "id": "0"},
                    "created_at": "2012-12-12T10:53:43-08:00",
                    "size": 2048
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/files/2")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = fetcher(&server);
        let options = CatalogOptions {
            fetch_metadata: true,
            ..CatalogOptions::default()
        };
        let catalog = ResourceCatalog::new(&fetcher, options).build("0").await.unwrap();

        assert_eq!(names(&catalog), vec!["a.jpg", "b.jpg"]);
        assert_eq!(catalog[0].size, Some(2048));
        assert!(catalog[0].created_at.is_some());
        assert_eq!(catalog[1].size, None);
        assert_eq!(catalog[1].parent_folder_id, "0");
    }
}

mod shared_links {
    use super::*;

    async fn mock_link(server: &mut ServerGuard, file_id: &str, status: usize) -> Mock {
        let body = json!({
            "type": "file",
            "id": file_id,
            "shared_link": {"url": format!("https://app.box.com/s/{}", file_id)}
        });
        server
            .mock("PUT", format!("/files/{}", file_id).as_str())
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn one_failed_link_does_not_abort_the_batch() {
        let mut server = Server::new_async().await;
        let _m = mock_folder(
            &mut server,
            "0",
            vec![file("1", "a.jpg", "0"), file("2", "b.jpg", "0"), file("3", "c.jpg", "0")],
        )
        .await;
        let _m = mock_link(&mut server, "1", 200).await;
        let _m = mock_link(&mut server, "2", 403).await;
        let _m = mock_link(&mut server, "3", 200).await;

        let fetcher = fetcher(&server);
        let mut catalog = ResourceCatalog::new(&fetcher, CatalogOptions::default())
            .build("0")
            .await
            .unwrap();
        let failures = annotate_shared_links(&fetcher, &mut catalog).await;

        assert_eq!(failures, 1);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[0].shared_link.as_deref(), Some("https://app.box.com/s/1"));
        assert_eq!(catalog[1].shared_link.as_deref(), Some(SHARED_LINK_FAILED));
        assert_eq!(catalog[2].shared_link.as_deref(), Some("https://app.box.com/s/3"));
    }
}

//! Synchronous project endpoints

use serde::Deserialize;

use crate::BrokerClient;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<String>,
}

impl BrokerClient {
    /// List the projects of a cluster
    ///
    /// The broker returns fully qualified names (`<project>-<cluster>`); only
    /// names belonging to `cluster` are kept, with the suffix stripped.
    pub(crate) async fn cluster_projects(&self, cluster: &str) -> Result<Vec<String>> {
        let url = format!("{}/v1/clusters/{}/projects", self.base_url, cluster);
        let response = self.authorized(self.client.get(&url)).await?.send().await?;
        let list: ProjectList = self.handle_response(response).await?;

        Ok(strip_cluster_suffix(list.projects, cluster))
    }
}

fn strip_cluster_suffix(projects: Vec<String>, cluster: &str) -> Vec<String> {
    let suffix = format!("-{}", cluster);
    projects
        .into_iter()
        .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationBroker;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_strip_cluster_suffix() {
        let projects = vec![
            "demo-clusterA".to_string(),
            "billing-clusterB".to_string(),
            "-clusterA".to_string(),
            "team-x-clusterA".to_string(),
        ];
        assert_eq!(
            strip_cluster_suffix(projects, "clusterA"),
            vec!["demo".to_string(), "team-x".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_projects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/clusters/clusterA/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": ["demo-clusterA", "other-clusterB"]
            })))
            .mount(&server)
            .await;

        let client = BrokerClient::new(server.uri());
        assert_eq!(client.list_projects("clusterA").await.unwrap(), vec!["demo"]);
    }
}

// Copyright 2018-2020 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Support for `OS_` environment variables.

use std::env;
use std::str::FromStr;

use log::debug;

use super::common::IdOrName;
use super::identity::{Password, Scope, Token};
use super::{Client, EndpointFilters, Error, ErrorKind, InterfaceType};

// Only used for unit testing.
trait Environment {
    fn get(&self, name: &'static str) -> Result<String, Error>;
}

#[derive(Debug, Clone, Copy)]
struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get(&self, name: &'static str) -> Result<String, Error> {
        env::var(name).map_err(|_| missing(name))
    }
}

fn missing(name: &str) -> Error {
    Error::new(
        ErrorKind::InvalidConfig,
        format!("Required environment variable {} is not provided", name),
    )
}

fn id_or_name<E: Environment>(
    env: &E,
    id_var: &'static str,
    name_var: &'static str,
) -> Option<IdOrName> {
    env.get(id_var)
        .map(IdOrName::Id)
        .or_else(|_| env.get(name_var).map(IdOrName::Name))
        .ok()
}

fn endpoint_filters<E: Environment>(env: &E) -> Result<EndpointFilters, Error> {
    let mut filters = EndpointFilters::default();
    if let Ok(interface) = env.get("OS_INTERFACE") {
        filters.set_interfaces(Some(InterfaceType::from_str(&interface)?));
    }
    if let Ok(region) = env.get("OS_REGION_NAME") {
        filters.set_region(region);
    }
    Ok(filters)
}

async fn from_environment<E: Environment>(
    http: reqwest::Client,
    env: E,
) -> Result<(Client, EndpointFilters), Error> {
    let auth_type = env.get("OS_AUTH_TYPE").unwrap_or_else(|_| {
        if env.get("OS_TOKEN").is_ok() {
            "v3token".to_string()
        } else {
            "password".to_string()
        }
    });

    let auth_url = env.get("OS_AUTH_URL")?;
    let project = id_or_name(&env, "OS_PROJECT_ID", "OS_PROJECT_NAME");
    let scope = project.map(|project| Scope::Project {
        project,
        domain: id_or_name(&env, "OS_PROJECT_DOMAIN_ID", "OS_PROJECT_DOMAIN_NAME"),
    });
    let filters = endpoint_filters(&env)?;

    debug!(
        "Authenticating with {} at {} using environment variables",
        auth_type, auth_url
    );
    let client = match auth_type.as_str() {
        "password" | "v3password" => {
            let user = id_or_name(&env, "OS_USER_ID", "OS_USERNAME")
                .ok_or_else(|| missing("OS_USERNAME"))?;
            let password = env.get("OS_PASSWORD")?;
            let user_domain = match user {
                IdOrName::Id(_) => None,
                IdOrName::Name(_) => Some(
                    id_or_name(&env, "OS_USER_DOMAIN_ID", "OS_USER_DOMAIN_NAME")
                        .unwrap_or_else(|| IdOrName::from_name("Default")),
                ),
            };
            let mut auth = Password::with_user(auth_url, user, password, user_domain)?;
            if let Some(scope) = scope {
                auth.set_scope(scope);
            }
            Client::authenticate(http, auth).await?
        }
        "token" | "v3token" => {
            let token = env.get("OS_TOKEN")?;
            let mut auth = Token::new(auth_url, token)?;
            if let Some(scope) = scope {
                auth.set_scope(scope);
            }
            Client::authenticate(http, auth).await?
        }
        other => {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                format!("Unsupported authentication type: {}", other),
            ))
        }
    };

    Ok((client, filters))
}

/// Create an authenticated `Client` from environment variables.
///
/// Uses the `OS_*` variables recognized by `python-openstackclient`. Supported authentication
/// types are `password` and `v3token`. Returns the client and the endpoint filters built from
/// `OS_INTERFACE` and `OS_REGION_NAME`.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), osclient::Error> {
/// let (client, filters) = osclient::from_env().await?;
/// let compute = client
///     .service_client(osclient::services::COMPUTE, &filters)
///     .await?;
/// # Ok(()) }
/// ```
pub async fn from_env() -> Result<(Client, EndpointFilters), Error> {
    from_environment(reqwest::Client::new(), RealEnvironment).await
}

#[cfg(test)]
pub mod test {
    use std::collections::HashMap;

    use maplit::hashmap;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer};

    use super::{from_environment, Environment};
    use crate::identity::test::token_response;
    use crate::{Error, ErrorKind, InterfaceType};

    impl Environment for HashMap<&'static str, String> {
        fn get(&self, name: &'static str) -> Result<String, Error> {
            HashMap::get(self, name)
                .cloned()
                .ok_or_else(|| super::missing(name))
        }
    }

    async fn identity(server: &MockServer, expected: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/identity/v3/auth/tokens"))
            .and(body_partial_json(expected))
            .respond_with(token_response(
                "env-token",
                json!([{
                    "type": "compute",
                    "endpoints": [
                        {"interface": "internal", "region": "RegionTwo", "url": "http://compute/v2.1"}
                    ]
                }]),
            ))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_password_with_domains() {
        let server = MockServer::start().await;
        identity(
            &server,
            json!({"auth": {
                "identity": {"methods": ["password"], "password": {"user": {
                    "name": "admin", "domain": {"name": "Default"}
                }}},
                "scope": {"project": {"name": "admin", "domain": {"id": "default"}}}
            }}),
        )
        .await;

        let env = hashmap! {
            "OS_AUTH_URL" => format!("{}/identity", server.uri()),
            "OS_USERNAME" => "admin".to_string(),
            "OS_PASSWORD" => "password".to_string(),
            "OS_PROJECT_NAME" => "admin".to_string(),
            "OS_PROJECT_DOMAIN_ID" => "default".to_string(),
            "OS_INTERFACE" => "internal".to_string(),
            "OS_REGION_NAME" => "RegionTwo".to_string(),
        };

        let (client, filters) = from_environment(reqwest::Client::new(), env).await.unwrap();
        assert_eq!(client.token().await.unwrap().value(), "env-token");
        assert_eq!(filters.interfaces(), &[InterfaceType::Internal]);
        assert_eq!(filters.region(), Some("RegionTwo"));
        let compute = client
            .service_client(crate::services::COMPUTE, &filters)
            .await
            .unwrap();
        assert_eq!(compute.endpoint().as_str(), "http://compute/v2.1");
    }

    #[tokio::test]
    async fn test_password_user_id() {
        let server = MockServer::start().await;
        identity(
            &server,
            json!({"auth": {"identity": {"password": {"user": {"id": "u1"}}}}}),
        )
        .await;

        let env = hashmap! {
            "OS_AUTH_TYPE" => "password".to_string(),
            "OS_AUTH_URL" => format!("{}/identity", server.uri()),
            "OS_USER_ID" => "u1".to_string(),
            "OS_PASSWORD" => "password".to_string(),
        };

        let (_client, filters) = from_environment(reqwest::Client::new(), env).await.unwrap();
        assert_eq!(filters.interfaces(), &[InterfaceType::Public]);
        assert_eq!(filters.region(), None);
    }

    #[tokio::test]
    async fn test_token() {
        let server = MockServer::start().await;
        identity(
            &server,
            json!({"auth": {
                "identity": {"methods": ["token"], "token": {"id": "abcd"}},
                "scope": {"project": {"id": "p1"}}
            }}),
        )
        .await;

        let env = hashmap! {
            "OS_AUTH_URL" => format!("{}/identity/v3", server.uri()),
            "OS_TOKEN" => "abcd".to_string(),
            "OS_PROJECT_ID" => "p1".to_string(),
        };

        let (client, _filters) = from_environment(reqwest::Client::new(), env).await.unwrap();
        assert_eq!(client.token().await.unwrap().value(), "env-token");
    }

    #[tokio::test]
    async fn test_missing_variables() {
        let env = hashmap! {
            "OS_USERNAME" => "admin".to_string(),
        };
        let err = from_environment(reqwest::Client::new(), env)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.message().contains("OS_AUTH_URL"));

        let env = hashmap! {
            "OS_AUTH_URL" => "http://identity".to_string(),
            "OS_USERNAME" => "admin".to_string(),
        };
        let err = from_environment(reqwest::Client::new(), env)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.message().contains("OS_PASSWORD"));
    }

    #[tokio::test]
    async fn test_invalid_settings() {
        let env = hashmap! {
            "OS_AUTH_TYPE" => "http_basic".to_string(),
            "OS_AUTH_URL" => "http://identity".to_string(),
        };
        let err = from_environment(reqwest::Client::new(), env)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let env = hashmap! {
            "OS_AUTH_URL" => "http://identity".to_string(),
            "OS_TOKEN" => "abcd".to_string(),
            "OS_INTERFACE" => "private".to_string(),
        };
        let err = from_environment(reqwest::Client::new(), env)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

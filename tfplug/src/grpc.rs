//! gRPC service implementation for the Terraform Plugin Protocol v6
//!
//! The server speaks the go-plugin handshake on stdout, serves the provider
//! over TLS on a loopback port, and translates protocol messages into calls
//! on the factory-based Provider trait.

use crate::attribute_type::AttributeType;
use crate::context::Context;
use crate::proto::tfplugin6::{
    provider_server::{Provider as ProtoProvider, ProviderServer as ProtoProviderServer},
    *,
};
use crate::provider::{DataSource as _, Provider, Resource as _};
use crate::request::{CreateRequest, DeleteRequest, ReadRequest, UpdateRequest};
use crate::types::{Config, Diagnostics as TfplugDiagnostics, Dynamic, State};
use crate::Result;
use rmp_serde::{decode, encode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status};

pub struct ProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl<P: Provider + 'static> ProviderServer<P> {
    pub fn new(provider: P, cert_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            cert_path,
            key_path,
        }
    }

    pub async fn run(self) -> Result<()> {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .map_err(|_| crate::TfplugError::TlsError("crypto provider already installed".into()))?;

        let cert = tokio::fs::read(&self.cert_path).await?;
        let key = tokio::fs::read(&self.key_path).await?;
        let identity = Identity::from_pem(cert, key);

        let tls_config = ServerTlsConfig::new().identity(identity);

        let addr = "127.0.0.1:0";
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        // go-plugin handshake: core protocol 1, plugin protocol 6
        println!("1|6|tcp|127.0.0.1:{}|grpc", bound_addr.port());
        tracing::debug!(port = bound_addr.port(), "provider server started");

        let stream = TcpListenerStream::new(listener);

        let service = ProviderService {
            provider: self.provider.clone(),
        };

        Server::builder()
            .tls_config(tls_config)?
            .add_service(ProtoProviderServer::new(service))
            .serve_with_incoming(stream)
            .await?;

        Ok(())
    }
}

struct ProviderService<P: Provider> {
    provider: Arc<RwLock<P>>,
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for ProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<get_metadata::Request>,
    ) -> std::result::Result<Response<get_metadata::Response>, Status> {
        let provider = self.provider.read().await;
        let data_sources = provider
            .data_source_schemas()
            .await
            .into_keys()
            .map(|type_name| get_metadata::DataSourceMetadata { type_name })
            .collect();
        let resources = provider
            .resource_schemas()
            .await
            .into_keys()
            .map(|type_name| get_metadata::ResourceMetadata { type_name })
            .collect();

        Ok(Response::new(get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources,
            resources,
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<get_provider_schema::Request>,
    ) -> std::result::Result<Response<get_provider_schema::Response>, Status> {
        let provider = self.provider.read().await;
        let provider_schema = provider.provider_schema().await;
        let data_source_schemas = provider.data_source_schemas().await;
        let resource_schemas = provider.resource_schemas().await;

        let provider_block = Schema {
            version: provider_schema.version,
            block: Some(attributes_to_block(
                provider_schema.version,
                &provider_schema.attributes,
            )),
        };

        let data_sources = data_source_schemas
            .into_iter()
            .map(|(name, schema)| {
                (
                    name,
                    Schema {
                        version: schema.version,
                        block: Some(attributes_to_block(schema.version, &schema.attributes)),
                    },
                )
            })
            .collect();

        let resources = resource_schemas
            .into_iter()
            .map(|(name, schema)| {
                (
                    name,
                    Schema {
                        version: schema.version,
                        block: Some(attributes_to_block(schema.version, &schema.attributes)),
                    },
                )
            })
            .collect();

        Ok(Response::new(get_provider_schema::Response {
            provider: Some(provider_block),
            resource_schemas: resources,
            data_source_schemas: data_sources,
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<validate_provider_config::Request>,
    ) -> std::result::Result<Response<validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let _config = decode_dynamic_value(&req.config)?;

        Ok(Response::new(validate_provider_config::Response {
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<configure_provider::Request>,
    ) -> std::result::Result<Response<configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        tracing::debug!(
            keys = ?config.values.keys().collect::<Vec<_>>(),
            "configure_provider called"
        );

        let configure_req = crate::request::ConfigureRequest {
            context: Context::new(),
            config,
        };

        let mut provider = self.provider.write().await;
        let response = provider.configure(configure_req).await;

        Ok(Response::new(configure_provider::Response {
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<stop_provider::Request>,
    ) -> std::result::Result<Response<stop_provider::Response>, Status> {
        Ok(Response::new(stop_provider::Response {
            error: String::new(),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<validate_resource_config::Request>,
    ) -> std::result::Result<Response<validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let type_name = req.type_name;

        let provider = self.provider.read().await;
        let schemas = provider.resource_schemas().await;
        let schema = match schemas.get(&type_name) {
            Some(s) => s,
            None => {
                return Ok(Response::new(validate_resource_config::Response {
                    diagnostics: vec![Diagnostic {
                        severity: diagnostic::Severity::Error as i32,
                        summary: format!("Unknown resource type: {}", type_name),
                        detail: String::new(),
                        attribute: None,
                    }],
                }))
            }
        };

        // Unknown values during planning decode as errors; validation waits
        // for apply in that case
        let config = match decode_dynamic_value(&req.config) {
            Ok(config) => config,
            Err(e) => {
                if e.to_string().contains("data did not match any variant") {
                    tracing::debug!("skipping validation, config has unknown values");
                    return Ok(Response::new(validate_resource_config::Response {
                        diagnostics: vec![],
                    }));
                } else {
                    return Err(e);
                }
            }
        };

        let mut diagnostics = Vec::new();

        for (attr_name, attr) in &schema.attributes {
            if attr.required && !config.values.contains_key::<str>(attr_name) {
                diagnostics.push(Diagnostic {
                    severity: diagnostic::Severity::Error as i32,
                    summary: format!("Missing required field: {}", attr_name),
                    detail: format!("The field '{}' is required but was not provided", attr_name),
                    attribute: Some(attribute_path(attr_name)),
                });
            }
        }

        for (field_name, value) in &config.values {
            match schema.attributes.get(field_name) {
                Some(attr) => {
                    if !validate_dynamic_type(value, &attr.r#type) {
                        diagnostics.push(Diagnostic {
                            severity: diagnostic::Severity::Error as i32,
                            summary: format!("Type mismatch for field: {}", field_name),
                            detail: format!(
                                "Field '{}' expects type {:?} but got {}",
                                field_name,
                                attr.r#type,
                                value.type_name()
                            ),
                            attribute: Some(attribute_path(field_name)),
                        });
                    }
                }
                None => {
                    diagnostics.push(Diagnostic {
                        severity: diagnostic::Severity::Error as i32,
                        summary: format!("Unknown field: {}", field_name),
                        detail: format!(
                            "The field '{}' is not defined in the resource schema",
                            field_name
                        ),
                        attribute: Some(attribute_path(field_name)),
                    });
                }
            }
        }

        Ok(Response::new(validate_resource_config::Response {
            diagnostics,
        }))
    }

    async fn validate_data_resource_config(
        &self,
        _request: Request<validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<validate_data_resource_config::Response>, Status> {
        Ok(Response::new(validate_data_resource_config::Response {
            diagnostics: vec![],
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();

        // No schema migrations yet, pass the raw JSON state through unchanged
        let upgraded_state = req.raw_state.as_ref().map(|raw| DynamicValue {
            msgpack: vec![],
            json: raw.json.clone(),
        });

        Ok(Response::new(upgrade_resource_state::Response {
            upgraded_state,
            diagnostics: vec![],
        }))
    }

    async fn read_resource(
        &self,
        request: Request<read_resource::Request>,
    ) -> std::result::Result<Response<read_resource::Response>, Status> {
        let req = request.into_inner();
        let type_name = req.type_name;

        let provider = self.provider.read().await;
        let resource = provider
            .create_resource(&type_name)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        let current_state = decode_dynamic_value(&req.current_state)?;

        let read_req = ReadRequest {
            context: Context::new(),
            current_state: State {
                values: current_state.values,
            },
        };

        let read_resp = resource.read(read_req).await;

        // None means the remote object is gone; an empty DynamicValue tells
        // Terraform to drop it from state
        let new_state = match read_resp.state {
            Some(state) => encode_state(&state)?,
            None => DynamicValue {
                msgpack: encode::to_vec_named(&Option::<HashMap<String, Dynamic>>::None)
                    .map_err(|e| Status::internal(format!("Failed to encode msgpack: {}", e)))?,
                json: vec![],
            },
        };

        Ok(Response::new(read_resource::Response {
            new_state: Some(new_state),
            diagnostics: convert_diagnostics(read_resp.diagnostics),
            private: vec![],
            deferred: None,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<plan_resource_change::Request>,
    ) -> std::result::Result<Response<plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let type_name = req.type_name;

        let provider = self.provider.read().await;
        let resource_schemas = provider.resource_schemas().await;
        if !resource_schemas.contains_key(&type_name) {
            return Err(Status::not_found(format!(
                "Unknown resource type: {}",
                type_name
            )));
        }

        let prior_state = decode_dynamic_value(&req.prior_state)?.values;
        let proposed_new_state = decode_dynamic_value(&req.proposed_new_state)?.values;

        // Planning passes the proposed state through; the provider fills in
        // computed values during apply
        let planned_state = if !prior_state.is_empty() && proposed_new_state.is_empty() {
            HashMap::new()
        } else {
            proposed_new_state
        };

        let encoded_planned_state = encode_dynamic_values(&planned_state)?;

        Ok(Response::new(plan_resource_change::Response {
            planned_state: Some(encoded_planned_state),
            requires_replace: vec![],
            planned_private: vec![],
            diagnostics: vec![],
            legacy_type_system: false,
            deferred: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<apply_resource_change::Request>,
    ) -> std::result::Result<Response<apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let type_name = req.type_name;

        let provider = self.provider.read().await;
        let resource = provider
            .create_resource(&type_name)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        let prior_state = decode_dynamic_value(&req.prior_state)?.values;
        let config = decode_dynamic_value(&req.config)?.values;
        let planned_state = decode_dynamic_value(&req.planned_state)?.values;

        let context = Context::new();

        let is_create = prior_state.is_empty() && !planned_state.is_empty();
        let is_delete = !prior_state.is_empty() && planned_state.is_empty();
        let is_update = !prior_state.is_empty() && !planned_state.is_empty();

        let (new_state, diagnostics) = if is_create {
            let create_req = CreateRequest {
                context,
                config: Config { values: config },
                planned_state: State {
                    values: planned_state.clone(),
                },
            };
            let create_resp = resource.create(create_req).await;
            (create_resp.state, create_resp.diagnostics)
        } else if is_delete {
            let delete_req = DeleteRequest {
                context,
                current_state: State {
                    values: prior_state.clone(),
                },
            };
            let delete_resp = resource.delete(delete_req).await;
            (
                State {
                    values: HashMap::new(),
                },
                delete_resp.diagnostics,
            )
        } else if is_update {
            let update_req = UpdateRequest {
                context,
                config: Config { values: config },
                planned_state: State {
                    values: planned_state.clone(),
                },
                current_state: State {
                    values: prior_state.clone(),
                },
            };
            let update_resp = resource.update(update_req).await;
            (update_resp.state, update_resp.diagnostics)
        } else {
            (
                State {
                    values: planned_state.clone(),
                },
                TfplugDiagnostics::new(),
            )
        };

        if diagnostics.has_errors() {
            // Failed creates return the planned state so Terraform can
            // retry; other operations keep the prior state
            let state_to_return = if is_create {
                &planned_state
            } else {
                &prior_state
            };

            Ok(Response::new(apply_resource_change::Response {
                new_state: Some(encode_dynamic_values(state_to_return)?),
                diagnostics: convert_diagnostics(diagnostics),
                private: vec![],
                legacy_type_system: false,
            }))
        } else {
            let new_state_value = if is_delete && new_state.values.is_empty() {
                None
            } else {
                Some(encode_state(&new_state)?)
            };

            Ok(Response::new(apply_resource_change::Response {
                new_state: new_state_value,
                diagnostics: convert_diagnostics(diagnostics),
                private: vec![],
                legacy_type_system: false,
            }))
        }
    }

    async fn import_resource_state(
        &self,
        request: Request<import_resource_state::Request>,
    ) -> std::result::Result<Response<import_resource_state::Response>, Status> {
        let req = request.into_inner();

        Ok(Response::new(import_resource_state::Response {
            imported_resources: vec![],
            diagnostics: vec![Diagnostic {
                severity: diagnostic::Severity::Error as i32,
                summary: format!("Import is not supported for {}", req.type_name),
                detail: String::new(),
                attribute: None,
            }],
            deferred: None,
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<read_data_source::Request>,
    ) -> std::result::Result<Response<read_data_source::Response>, Status> {
        let req = request.into_inner();
        let type_name = req.type_name;
        let config = decode_dynamic_value(&req.config)?;

        tracing::debug!(%type_name, "read_data_source called");

        let provider = self.provider.read().await;
        let data_source = provider
            .create_data_source(&type_name)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        let read_req = ReadRequest {
            context: Context::new(),
            current_state: State {
                values: config.values,
            },
        };

        let read_resp = data_source.read(read_req).await;

        let state_value = match read_resp.state {
            Some(state) => Some(encode_state(&state)?),
            None => None,
        };

        Ok(Response::new(read_data_source::Response {
            state: state_value,
            diagnostics: convert_diagnostics(read_resp.diagnostics),
            deferred: None,
        }))
    }
}

// Helper functions

fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn attribute_path(name: &str) -> AttributePath {
    AttributePath {
        steps: vec![attribute_path::Step {
            selector: Some(attribute_path::step::Selector::AttributeName(
                name.to_string(),
            )),
        }],
    }
}

fn attributes_to_block(
    version: i64,
    attributes: &HashMap<String, crate::schema::Attribute>,
) -> schema::Block {
    schema::Block {
        version,
        attributes: attributes
            .values()
            .map(|attr| schema::Attribute {
                name: attr.name.clone(),
                r#type: attribute_type_to_bytes(&attr.r#type),
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: StringKind::Plain as i32,
                deprecated: false,
            })
            .collect(),
        block_types: vec![],
        description: String::new(),
        description_kind: StringKind::Plain as i32,
        deprecated: false,
    }
}

fn attribute_type_to_bytes(attr_type: &AttributeType) -> Vec<u8> {
    match attr_type {
        AttributeType::String => "\"string\"".as_bytes().to_vec(),
        AttributeType::Number => "\"number\"".as_bytes().to_vec(),
        AttributeType::Bool => "\"bool\"".as_bytes().to_vec(),
        AttributeType::List(elem) => {
            let elem_type = attribute_type_to_bytes(elem);
            format!("[\"list\", {}]", String::from_utf8_lossy(&elem_type)).into_bytes()
        }
        AttributeType::Set(elem) => {
            let elem_type = attribute_type_to_bytes(elem);
            format!("[\"set\", {}]", String::from_utf8_lossy(&elem_type)).into_bytes()
        }
        AttributeType::Map(elem) => {
            let elem_type = attribute_type_to_bytes(elem);
            format!("[\"map\", {}]", String::from_utf8_lossy(&elem_type)).into_bytes()
        }
        AttributeType::Object(attrs) => {
            let mut attrs_json: Vec<String> = attrs
                .iter()
                .map(|(name, attr_type)| {
                    format!(
                        "\"{}\": {}",
                        name,
                        String::from_utf8_lossy(&attribute_type_to_bytes(attr_type))
                    )
                })
                .collect();
            attrs_json.sort();
            format!("[\"object\", {{{}}}]", attrs_json.join(", ")).into_bytes()
        }
    }
}

#[allow(clippy::result_large_err)]
fn decode_dynamic_value(value: &Option<DynamicValue>) -> std::result::Result<Config, Status> {
    let value = match value {
        Some(v) => v,
        None => {
            return Ok(Config {
                values: HashMap::new(),
            })
        }
    };

    if !value.msgpack.is_empty() {
        // The whole config block can itself be null, try that before failing
        match decode::from_slice::<HashMap<String, Dynamic>>(&value.msgpack) {
            Ok(values) => Ok(Config { values }),
            Err(e) => match decode::from_slice::<Option<HashMap<String, Dynamic>>>(&value.msgpack) {
                Ok(None) => Ok(Config {
                    values: HashMap::new(),
                }),
                Ok(Some(values)) => Ok(Config { values }),
                Err(_) => Err(Status::invalid_argument(format!(
                    "Failed to decode msgpack: {}",
                    e
                ))),
            },
        }
    } else if !value.json.is_empty() {
        let values: HashMap<String, Dynamic> = serde_json::from_slice(&value.json)
            .map_err(|e| Status::invalid_argument(format!("Failed to decode json: {}", e)))?;
        Ok(Config { values })
    } else {
        Ok(Config {
            values: HashMap::new(),
        })
    }
}

#[allow(clippy::result_large_err)]
fn encode_state(state: &State) -> std::result::Result<DynamicValue, Status> {
    let msgpack = encode::to_vec_named(&state.values)
        .map_err(|e| Status::internal(format!("Failed to encode msgpack: {}", e)))?;

    Ok(DynamicValue {
        msgpack,
        json: vec![],
    })
}

#[allow(clippy::result_large_err)]
fn encode_dynamic_values(
    values: &HashMap<String, Dynamic>,
) -> std::result::Result<DynamicValue, Status> {
    let state = State {
        values: values.clone(),
    };
    encode_state(&state)
}

fn validate_dynamic_type(value: &Dynamic, expected_type: &AttributeType) -> bool {
    match (value, expected_type) {
        // Null and unknown are acceptable anywhere (computed or unresolved)
        (Dynamic::Null, _) => true,
        (Dynamic::Unknown, _) => true,
        (Dynamic::String(_), AttributeType::String) => true,
        (Dynamic::Number(_), AttributeType::Number) => true,
        (Dynamic::Bool(_), AttributeType::Bool) => true,
        (Dynamic::List(list), AttributeType::List(elem_type)) => list
            .iter()
            .all(|elem| validate_dynamic_type(elem, elem_type)),
        (Dynamic::List(list), AttributeType::Set(elem_type)) => list
            .iter()
            .all(|elem| validate_dynamic_type(elem, elem_type)),
        (Dynamic::Map(map), AttributeType::Map(elem_type)) => map
            .values()
            .all(|elem| validate_dynamic_type(elem, elem_type)),
        (Dynamic::Map(map), AttributeType::Object(attrs)) => {
            for (field_name, field_type) in attrs {
                if let Some(value) = map.get(field_name) {
                    if !validate_dynamic_type(value, field_type) {
                        return false;
                    }
                }
            }
            true
        }
        _ => false,
    }
}

fn convert_diagnostics(diags: TfplugDiagnostics) -> Vec<Diagnostic> {
    let mut result = Vec::new();

    for diag in diags.errors {
        result.push(Diagnostic {
            severity: diagnostic::Severity::Error as i32,
            summary: diag.summary,
            detail: diag.detail.unwrap_or_default(),
            attribute: None,
        });
    }

    for diag in diags.warnings {
        result.push(Diagnostic {
            severity: diagnostic::Severity::Warning as i32,
            summary: diag.summary,
            detail: diag.detail.unwrap_or_default(),
            attribute: None,
        });
    }

    result
}

//! In-memory fixture documents for unit and integration tests.
//!
//! A small travel service in both protocol versions: a `Travel` entity with a
//! `Booking` composition, a list report on travels and an object page whose
//! bookings facet is a table. The manifests deliberately configure one table
//! that has no matching annotation, so every linked fixture has one orphan.

use std::sync::Arc;

use url::Url;

use crate::document_store::{Document, DocumentKind, DocumentStore};
use crate::project::{ApplicationParser, DiscoveredApp, ParsedApplication};
use crate::service::{MetadataElement, MetadataKind};
use crate::syntax::TextRange;

/// Root of the single-application fixture project
pub const APP_ROOT: &str = "file:///ws/app/";
pub const MANIFEST_URI: &str = "file:///ws/app/webapp/manifest.json";
pub const METADATA_URI: &str = "file:///ws/app/webapp/localService/metadata.xml";
pub const ANNOTATION_URI: &str = "file:///ws/app/webapp/annotations/annotation.xml";

// ============================================================================
// OData V4
// ============================================================================

pub const TRAVEL_METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="https://sap.github.io/odata-vocabularies/vocabularies/UI.xml">
    <edmx:Include Namespace="com.sap.vocabularies.UI.v1" Alias="UI"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="sap.fe.travel" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityContainer Name="EntityContainer">
        <EntitySet Name="Travel" EntityType="sap.fe.travel.Travel">
          <NavigationPropertyBinding Path="_Booking" Target="Booking"/>
        </EntitySet>
        <EntitySet Name="Booking" EntityType="sap.fe.travel.Booking">
          <NavigationPropertyBinding Path="_Travel" Target="Travel"/>
        </EntitySet>
      </EntityContainer>
      <EntityType Name="Travel">
        <Key>
          <PropertyRef Name="TravelUUID"/>
        </Key>
        <Property Name="TravelUUID" Type="Edm.Guid" Nullable="false"/>
        <Property Name="TravelID" Type="Edm.String" MaxLength="8"/>
        <Property Name="Description" Type="Edm.String" MaxLength="1024"/>
        <NavigationProperty Name="_Booking" Type="Collection(sap.fe.travel.Booking)" Partner="_Travel"/>
      </EntityType>
      <EntityType Name="Booking">
        <Key>
          <PropertyRef Name="BookingUUID"/>
        </Key>
        <Property Name="BookingUUID" Type="Edm.Guid" Nullable="false"/>
        <Property Name="BookingID" Type="Edm.String" MaxLength="4"/>
        <NavigationProperty Name="_Travel" Type="sap.fe.travel.Travel" Partner="_Booking"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

const TRAVEL_ANNOTATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="/processor/$metadata">
    <edmx:Include Namespace="sap.fe.travel"/>
  </edmx:Reference>
  <edmx:Reference Uri="https://sap.github.io/odata-vocabularies/vocabularies/UI.xml">
    <edmx:Include Namespace="com.sap.vocabularies.UI.v1" Alias="UI"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="local" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <Annotations Target="sap.fe.travel.Travel">
        <Annotation Term="UI.LineItem">
          <Collection>
            <Record Type="UI.DataField">
              <PropertyValue Property="Value" Path="TravelID"/>
              <PropertyValue Property="Label" String="@LABEL@"/>
            </Record>
            <Record Type="UI.DataField">
              <PropertyValue Property="Value" Path="Description"/>
            </Record>
          </Collection>
        </Annotation>
        <Annotation Term="UI.FieldGroup" Qualifier="General">
          <Record Type="UI.FieldGroupType">
            <PropertyValue Property="Data">
              <Collection>
                <Record Type="UI.DataField">
                  <PropertyValue Property="Value" Path="Description"/>
                </Record>
              </Collection>
            </PropertyValue>
          </Record>
        </Annotation>
        <Annotation Term="UI.Facets">
          <Collection>
            <Record Type="UI.ReferenceFacet">
              <PropertyValue Property="ID" String="GeneralInformation"/>
              <PropertyValue Property="Target" AnnotationPath="@UI.FieldGroup#General"/>
            </Record>
            <Record Type="UI.ReferenceFacet">
              <PropertyValue Property="ID" String="Bookings"/>
              <PropertyValue Property="Target" AnnotationPath="_Booking/@UI.LineItem"/>
            </Record>
          </Collection>
        </Annotation>
      </Annotations>
      <Annotations Target="sap.fe.travel.Booking">
        <Annotation Term="UI.LineItem">
          <Collection>
            <Record Type="UI.DataField">
              <PropertyValue Property="Value" Path="BookingID"/>
            </Record>
          </Collection>
        </Annotation>
      </Annotations>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

/// Annotation file for [`TRAVEL_METADATA`]. `label` is the label of the
/// first travel line item column, so layers can be told apart.
pub fn travel_annotations(label: &str) -> String {
    TRAVEL_ANNOTATIONS.replace("@LABEL@", label)
}

const V4_MANIFEST: &str = r#"{
    "_version": "1.59.0",
    "sap.app": {
        "id": "sap.fe.travel.app",
        "type": "application",
        "dataSources": {
            "mainService": {
                "uri": "/processor/",
                "type": "OData",
                "settings": {
                    "annotations": ["annotation"],
                    "localUri": "localService/metadata.xml",
                    "odataVersion": "4.0"
                }
            },
            "annotation": {
                "type": "ODataAnnotation",
                "uri": "annotations/annotation.xml",
                "settings": {
                    "localUri": "annotations/annotation.xml"
                }
            }
        }
    },
    "sap.ui5": {
        "flexEnabled": true,
        "dependencies": {
            "minUI5Version": "1.120.0"
        },
        "models": {
            "": {
                "dataSource": "mainService"
            }
        },
        "routing": {
            "targets": {
                "@LIST_TARGET@": {
                    "type": "Component",
                    "id": "TravelList",
                    "name": "sap.fe.templates.ListReport",
                    "options": {
                        "settings": {
                            "contextPath": "@CONTEXT_PATH@"
                        }
                    }
                },
                "TravelObjectPage": {
                    "type": "Component",
                    "id": "TravelObjectPage",
                    "name": "sap.fe.templates.ObjectPage",
                    "options": {
                        "settings": {
                            "contextPath": "/Travel",
                            "controlConfiguration": {
                                "_Booking/@com.sap.vocabularies.UI.v1.LineItem": {
                                    "tableSettings": {
                                        "type": "GridTable"
                                    }
                                },
                                "_Booking/@com.sap.vocabularies.UI.v1.LineItem#missing": {
                                    "tableSettings": {
                                        "type": "ResponsiveTable"
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
"#;

/// V4 manifest with a list report target named `list_target` bound to
/// `context_path`, and a travel object page.
pub fn v4_manifest(list_target: &str, context_path: &str) -> String {
    V4_MANIFEST
        .replace("@LIST_TARGET@", list_target)
        .replace("@CONTEXT_PATH@", context_path)
}

/// V4 manifest that also configures generic-app pages
pub fn mixed_manifest() -> String {
    let mut manifest: serde_json::Value =
        serde_json::from_str(&v4_manifest("TravelList", "/Travel")).expect("fixture manifest");
    manifest["sap.ui.generic.app"] = serde_json::json!({
        "pages": {
            "ListReport|Travel": {
                "entitySet": "Travel",
                "component": {
                    "name": "sap.suite.ui.generic.template.ListReport",
                    "list": true
                }
            }
        }
    });
    serde_json::to_string_pretty(&manifest).expect("fixture manifest")
}

/// V4 manifest whose main service has no local copy, so its artifacts come
/// from the project's declarative model
pub fn cap_manifest() -> String {
    let mut manifest: serde_json::Value =
        serde_json::from_str(&v4_manifest("TravelList", "/Travel")).expect("fixture manifest");
    let data_sources = &mut manifest["sap.app"]["dataSources"];
    data_sources["mainService"]["settings"] = serde_json::json!({ "odataVersion": "4.0" });
    if let Some(sources) = data_sources.as_object_mut() {
        sources.remove("annotation");
    }
    serde_json::to_string_pretty(&manifest).expect("fixture manifest")
}

// ============================================================================
// OData V2
// ============================================================================

pub const TRAVEL_METADATA_V2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata" xmlns:sap="http://www.sap.com/Protocols/SAPData">
  <edmx:DataServices m:DataServiceVersion="2.0">
    <Schema Namespace="ZTRAVEL_SRV" xml:lang="en" sap:schema-version="1" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">
      <EntityType Name="Travel" sap:content-version="1">
        <Key>
          <PropertyRef Name="TravelID"/>
        </Key>
        <Property Name="TravelID" Type="Edm.String" Nullable="false" MaxLength="8"/>
        <Property Name="Description" Type="Edm.String" MaxLength="1024"/>
        <NavigationProperty Name="to_Booking" Relationship="ZTRAVEL_SRV.assoc_Travel_Booking" FromRole="FromRole_assoc_Travel_Booking" ToRole="ToRole_assoc_Travel_Booking"/>
      </EntityType>
      <EntityType Name="Booking" sap:content-version="1">
        <Key>
          <PropertyRef Name="TravelID"/>
          <PropertyRef Name="BookingID"/>
        </Key>
        <Property Name="TravelID" Type="Edm.String" Nullable="false" MaxLength="8"/>
        <Property Name="BookingID" Type="Edm.String" Nullable="false" MaxLength="4"/>
      </EntityType>
      <Association Name="assoc_Travel_Booking">
        <End Type="ZTRAVEL_SRV.Travel" Multiplicity="1" Role="FromRole_assoc_Travel_Booking"/>
        <End Type="ZTRAVEL_SRV.Booking" Multiplicity="*" Role="ToRole_assoc_Travel_Booking"/>
      </Association>
      <EntityContainer Name="ZTRAVEL_SRV_Entities" m:IsDefaultEntityContainer="true">
        <EntitySet Name="Travel" EntityType="ZTRAVEL_SRV.Travel"/>
        <EntitySet Name="Booking" EntityType="ZTRAVEL_SRV.Booking"/>
        <AssociationSet Name="assoc_Travel_Booking" Association="ZTRAVEL_SRV.assoc_Travel_Booking">
          <End EntitySet="Travel" Role="FromRole_assoc_Travel_Booking"/>
          <End EntitySet="Booking" Role="ToRole_assoc_Travel_Booking"/>
        </AssociationSet>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

pub const TRAVEL_ANNOTATIONS_V2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="/sap/opu/odata/sap/ZTRAVEL_SRV/$metadata">
    <edmx:Include Namespace="ZTRAVEL_SRV" Alias="SAP"/>
  </edmx:Reference>
  <edmx:Reference Uri="https://sap.github.io/odata-vocabularies/vocabularies/UI.xml">
    <edmx:Include Namespace="com.sap.vocabularies.UI.v1" Alias="UI"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="ztravel.annotations" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <Annotations Target="SAP.Travel">
        <Annotation Term="UI.LineItem">
          <Collection>
            <Record Type="UI.DataField">
              <PropertyValue Property="Value" Path="TravelID"/>
            </Record>
          </Collection>
        </Annotation>
        <Annotation Term="UI.Facets">
          <Collection>
            <Record Type="UI.ReferenceFacet">
              <PropertyValue Property="ID" String="Bookings"/>
              <PropertyValue Property="Target" AnnotationPath="to_Booking/@UI.LineItem"/>
            </Record>
          </Collection>
        </Annotation>
      </Annotations>
      <Annotations Target="SAP.Booking">
        <Annotation Term="UI.LineItem">
          <Collection>
            <Record Type="UI.DataField">
              <PropertyValue Property="Value" Path="BookingID"/>
            </Record>
          </Collection>
        </Annotation>
      </Annotations>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

const V2_SAP_APP: &str = r#""sap.app": {
        "id": "ztravel.app",
        "type": "application",
        "dataSources": {
            "mainService": {
                "uri": "/sap/opu/odata/sap/ZTRAVEL_SRV/",
                "type": "OData",
                "settings": {
                    "annotations": ["ZTRAVEL_ANNO_MDL", "annotation"],
                    "localUri": "localService/metadata.xml",
                    "odataVersion": "2.0"
                }
            },
            "ZTRAVEL_ANNO_MDL": {
                "uri": "/sap/opu/odata/IWFND/CATALOGSERVICE;v=2/Annotations(TechnicalName='ZTRAVEL_ANNO_MDL',Version='0001')/$value/",
                "type": "ODataAnnotation",
                "settings": {
                    "localUri": "localService/ZTRAVEL_ANNO_MDL.xml"
                }
            },
            "annotation": {
                "type": "ODataAnnotation",
                "uri": "annotations/annotation.xml",
                "settings": {
                    "localUri": "annotations/annotation.xml"
                }
            }
        }
    },
    "sap.ui5": {
        "dependencies": {
            "minUI5Version": "1.96.0"
        },
        "models": {
            "": {
                "dataSource": "mainService"
            }
        }
    }"#;

const V2_OBJECT_PAGE: &str = r#"{
                    "entitySet": "Travel",
                    "component": {
                        "name": "sap.suite.ui.generic.template.ObjectPage",
                        "settings": {
                            "tableType": "ResponsiveTable",
                            "sections": {
                                "to_Booking::com.sap.vocabularies.UI.v1.LineItem": {
                                    "tableType": "GridTable"
                                },
                                "to_Booking::com.sap.vocabularies.UI.v1.LineItem::missing": {
                                    "tableSettings": {
                                        "type": "GridTable"
                                    }
                                }
                            }
                        }
                    }
                }"#;

const V2_LIST_REPORT: &str = r#"{
            "entitySet": "Travel",
            "component": {
                "name": "sap.suite.ui.generic.template.ListReport",
                "list": true,
                "settings": {
                    "tableSettings": {
                        "multiSelect": true
                    }
                }
            },
            "pages": @NESTED@
        }"#;

/// Generic-app manifest with a travel list report and a nested object page.
/// `legacy` writes the pages as arrays instead of maps.
pub fn v2_manifest(legacy: bool) -> String {
    let (nested, pages) = if legacy {
        (
            format!("[\n                {}\n            ]", V2_OBJECT_PAGE),
            "[\n        @LIST@\n    ]",
        )
    } else {
        (
            format!("{{\n                \"ObjectPage|Travel\": {}\n            }}", V2_OBJECT_PAGE),
            "{\n        \"ListReport|Travel\": @LIST@\n    }",
        )
    };
    let list = V2_LIST_REPORT.replace("@NESTED@", &nested);
    let pages = pages.replace("@LIST@", &list);
    format!(
        "{{\n    \"_version\": \"1.32.0\",\n    {},\n    \"sap.ui.generic.app\": {{\n    \"_version\": \"1.3.0\",\n    \"settings\": {{\n        \"forceGlobalRefresh\": false\n    }},\n    \"pages\": {}\n    }}\n}}\n",
        V2_SAP_APP, pages
    )
}

// ============================================================================
// Builders
// ============================================================================

pub fn url(uri: &str) -> Url {
    Url::parse(uri).expect("fixture URI")
}

/// Metadata document at [`METADATA_URI`]
pub fn metadata_document(text: &str) -> Arc<Document> {
    Arc::new(Document::new(
        url(METADATA_URI),
        text.to_string(),
        DocumentKind::Metadata,
        0,
    ))
}

/// Entity type element without children, for model tests
pub fn entity_type(path: &str) -> MetadataElement {
    let name = path.rsplit('.').next().unwrap_or(path);
    MetadataElement::leaf(name, path.to_string(), MetadataKind::EntityType, TextRange::default())
}

/// The fixture application as discovered by a host
pub fn discovered_app() -> DiscoveredApp {
    DiscoveredApp::new(url(MANIFEST_URI), url(APP_ROOT), url(APP_ROOT))
}

/// Store holding `manifest` and the given service documents at the fixture
/// application's locations
pub fn app_store(manifest: &str, metadata: &str, annotations: &str) -> DocumentStore {
    let mut store = DocumentStore::new();
    store.insert(url(MANIFEST_URI), manifest);
    store.insert(url(METADATA_URI), metadata);
    store.insert(url(ANNOTATION_URI), annotations);
    store
}

fn parse_single(store: &DocumentStore) -> Arc<ParsedApplication> {
    let project = ApplicationParser::default().parse(&[discovered_app()], store);
    project
        .apps
        .values()
        .next()
        .cloned()
        .expect("fixture application parses")
}

/// Parse `manifest` against the V4 travel service
pub fn parsed_v4_app(manifest: &str) -> Arc<ParsedApplication> {
    parse_single(&app_store(manifest, TRAVEL_METADATA, &travel_annotations("Travel")))
}

/// Parse `manifest` against the V2 travel service
pub fn parsed_v2_app(manifest: &str) -> Arc<ParsedApplication> {
    parse_single(&app_store(manifest, TRAVEL_METADATA_V2, TRAVEL_ANNOTATIONS_V2))
}

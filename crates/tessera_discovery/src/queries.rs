pub const GET_MODELS: &str = r#"
query GetModels(
  $environmentId: BigInt!,
  $modelsFilter: ModelAppliedFilter,
  $after: String,
  $first: Int,
  $sort: AppliedModelSort
) {
  environment(id: $environmentId) {
    applied {
      models(filter: $modelsFilter, after: $after, first: $first, sort: $sort) {
        pageInfo {
          endCursor
        }
        edges {
          node {
            name
            uniqueId
            description
          }
        }
      }
    }
  }
}
"#;

pub const GET_MODEL_DETAILS: &str = r#"
query GetModelDetails($environmentId: BigInt!, $modelsFilter: ModelAppliedFilter, $first: Int) {
  environment(id: $environmentId) {
    applied {
      models(filter: $modelsFilter, first: $first) {
        edges {
          node {
            name
            uniqueId
            compiledCode
            description
            database
            schema
            catalog {
              columns {
                description
                name
                type
              }
            }
          }
        }
      }
    }
  }
}
"#;

macro_rules! lineage_query {
    ($operation:literal, $field:literal) => {
        concat!(
            "query ",
            $operation,
            r#"($environmentId: BigInt!, $modelsFilter: ModelAppliedFilter, $first: Int) {
  environment(id: $environmentId) {
    applied {
      models(filter: $modelsFilter, first: $first) {
        edges {
          node {
            "#,
            $field,
            r#" {
              ... on ExposureAppliedStateNestedNode { resourceType name description }
              ... on ExternalModelNode { resourceType name description }
              ... on MacroDefinitionNestedNode { resourceType name description }
              ... on MetricDefinitionNestedNode { resourceType name description }
              ... on ModelAppliedStateNestedNode { resourceType name description }
              ... on SavedQueryDefinitionNestedNode { resourceType name description }
              ... on SeedAppliedStateNestedNode { resourceType name description }
              ... on SemanticModelDefinitionNestedNode { resourceType name description }
              ... on SnapshotAppliedStateNestedNode { resourceType name description }
              ... on SourceAppliedStateNestedNode { resourceType name description }
              ... on TestAppliedStateNestedNode { resourceType name description }
            }
          }
        }
      }
    }
  }
}
"#
        )
    };
}

pub const GET_MODEL_PARENTS: &str = lineage_query!("GetModelParents", "parents");
pub const GET_MODEL_CHILDREN: &str = lineage_query!("GetModelChildren", "children");

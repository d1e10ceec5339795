//! Core PowerSchool resources.
//!
//! Each [`Resource`] names an endpoint template and whether it addresses a
//! single record or a paged collection. The convenience methods on
//! [`PowerSchool`] resolve a resource and hand it to [`PowerSchool::get_item`]
//! or [`PowerSchool::fetch_all`].

use crate::error::Result;
use crate::response::{self, ResourceId};
use crate::rest::{PowerSchool, QueryOptions};
use serde_json::Value;

/// A core resource endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Course(ResourceId),
    District,
    School(ResourceId),
    Section(ResourceId),
    Staff(ResourceId),
    Student(ResourceId),
    Term(ResourceId),
    SchoolCourses(ResourceId),
    DistrictSchools,
    SchoolSections(ResourceId),
    SchoolStaff(ResourceId),
    SchoolStudents(ResourceId),
    DistrictStudents,
}

impl Resource {
    /// Endpoint path relative to the server
    pub fn path(&self) -> String {
        match self {
            Resource::Course(id) => format!("ws/v1/course/{}", id),
            Resource::District => "ws/v1/district".to_string(),
            Resource::School(id) => format!("ws/v1/school/{}", id),
            Resource::Section(id) => format!("ws/v1/section/{}", id),
            Resource::Staff(id) => format!("ws/v1/staff/{}", id),
            Resource::Student(id) => format!("ws/v1/student/{}", id),
            Resource::Term(id) => format!("ws/v1/term/{}", id),
            Resource::SchoolCourses(id) => format!("ws/v1/school/{}/course", id),
            Resource::DistrictSchools => "ws/v1/district/school".to_string(),
            Resource::SchoolSections(id) => format!("ws/v1/school/{}/section", id),
            Resource::SchoolStaff(id) => format!("ws/v1/school/{}/staff", id),
            Resource::SchoolStudents(id) => format!("ws/v1/school/{}/student", id),
            Resource::DistrictStudents => "ws/v1/district/student".to_string(),
        }
    }

    /// Key wrapping a single record in its response
    pub fn key(&self) -> &'static str {
        match self {
            Resource::Course(_) | Resource::SchoolCourses(_) => "course",
            Resource::District => "district",
            Resource::School(_) | Resource::DistrictSchools => "school",
            Resource::Section(_) | Resource::SchoolSections(_) => "section",
            Resource::Staff(_) | Resource::SchoolStaff(_) => "staff",
            Resource::Student(_) | Resource::SchoolStudents(_) | Resource::DistrictStudents => {
                "student"
            }
            Resource::Term(_) => "term",
        }
    }

    /// True for paged collection endpoints
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Resource::SchoolCourses(_)
                | Resource::DistrictSchools
                | Resource::SchoolSections(_)
                | Resource::SchoolStaff(_)
                | Resource::SchoolStudents(_)
                | Resource::DistrictStudents
        )
    }
}

fn expanded(expansions: Option<&str>) -> QueryOptions {
    QueryOptions {
        expansions: expansions.map(str::to_string),
        ..QueryOptions::default()
    }
}

impl PowerSchool {
    /// Fetch one record and unwrap it from its `{"<resource>": {...}}` envelope
    pub async fn fetch_resource(
        &self,
        resource: &Resource,
        options: &QueryOptions,
    ) -> Result<Value> {
        let path = resource.path();
        let body = self.get_item(&path, options).await?;
        response::unwrap_single(body, resource.key()).inspect_err(
            |e| tracing::error!(path = %path, error = %e, "unexpected record response"),
        )
    }

    /// Fetch every record of a collection resource
    pub async fn fetch_collection(
        &self,
        resource: &Resource,
        options: &QueryOptions,
    ) -> Result<Vec<Value>> {
        self.fetch_all(&resource.path(), options).await
    }

    // Single records

    /// Course with the given DCID
    pub async fn course_for_dcid(&self, dcid: impl Into<ResourceId>) -> Result<Value> {
        self.fetch_resource(&Resource::Course(dcid.into()), &QueryOptions::default())
            .await
    }

    /// The current district
    pub async fn current_district(&self, expansions: Option<&str>) -> Result<Value> {
        self.fetch_resource(&Resource::District, &expanded(expansions))
            .await
    }

    /// School with the given ID
    pub async fn school_for_id(
        &self,
        id: impl Into<ResourceId>,
        expansions: Option<&str>,
    ) -> Result<Value> {
        self.fetch_resource(&Resource::School(id.into()), &expanded(expansions))
            .await
    }

    /// Section with the given DCID
    pub async fn section_for_dcid(
        &self,
        dcid: impl Into<ResourceId>,
        expansions: Option<&str>,
    ) -> Result<Value> {
        self.fetch_resource(&Resource::Section(dcid.into()), &expanded(expansions))
            .await
    }

    /// Staff member with the given DCID
    pub async fn staff_for_dcid(
        &self,
        dcid: impl Into<ResourceId>,
        expansions: Option<&str>,
    ) -> Result<Value> {
        self.fetch_resource(&Resource::Staff(dcid.into()), &expanded(expansions))
            .await
    }

    /// Student with the given DCID
    pub async fn student_for_dcid(
        &self,
        dcid: impl Into<ResourceId>,
        expansions: Option<&str>,
    ) -> Result<Value> {
        self.fetch_resource(&Resource::Student(dcid.into()), &expanded(expansions))
            .await
    }

    /// Term with the given DCID
    pub async fn term_for_dcid(&self, dcid: impl Into<ResourceId>) -> Result<Value> {
        self.fetch_resource(&Resource::Term(dcid.into()), &QueryOptions::default())
            .await
    }

    // Collections

    /// All courses of a school
    pub async fn courses_for_school(&self, school_id: impl Into<ResourceId>) -> Result<Vec<Value>> {
        let resource = Resource::SchoolCourses(school_id.into());
        self.fetch_collection(&resource, &QueryOptions::default())
            .await
    }

    /// All schools in the district
    pub async fn schools_in_district(&self, expansions: Option<&str>) -> Result<Vec<Value>> {
        self.fetch_collection(&Resource::DistrictSchools, &expanded(expansions))
            .await
    }

    /// Sections of a school, optionally filtered by `query`
    pub async fn sections_for_school(
        &self,
        school_id: impl Into<ResourceId>,
        expansions: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<Value>> {
        let options = QueryOptions {
            query: query.map(str::to_string),
            ..expanded(expansions)
        };
        self.fetch_collection(&Resource::SchoolSections(school_id.into()), &options)
            .await
    }

    /// All staff of a school
    pub async fn staff_for_school(
        &self,
        school_id: impl Into<ResourceId>,
        expansions: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.fetch_collection(&Resource::SchoolStaff(school_id.into()), &expanded(expansions))
            .await
    }

    /// Students of a school, optionally filtered by `query`
    pub async fn students_for_school(
        &self,
        school_id: impl Into<ResourceId>,
        expansions: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<Value>> {
        let options = QueryOptions {
            query: query.map(str::to_string),
            ..expanded(expansions)
        };
        self.fetch_collection(&Resource::SchoolStudents(school_id.into()), &options)
            .await
    }

    /// Students in the district, optionally filtered by `query`
    pub async fn students_in_district(
        &self,
        expansions: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<Value>> {
        let options = QueryOptions {
            query: query.map(str::to_string),
            ..expanded(expansions)
        };
        self.fetch_collection(&Resource::DistrictStudents, &options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Envelope;

    #[test]
    fn test_single_paths() {
        assert_eq!(Resource::Course(ResourceId::from(5)).path(), "ws/v1/course/5");
        assert_eq!(Resource::District.path(), "ws/v1/district");
        assert_eq!(Resource::Student(ResourceId::from("A1")).path(), "ws/v1/student/A1");
        assert!(!Resource::Term(ResourceId::from(1)).is_collection());
    }

    #[test]
    fn test_collection_paths_match_envelope() {
        let collections = [
            Resource::SchoolCourses(ResourceId::from(3)),
            Resource::DistrictSchools,
            Resource::SchoolSections(ResourceId::from(3)),
            Resource::SchoolStaff(ResourceId::from(3)),
            Resource::SchoolStudents(ResourceId::from(3)),
            Resource::DistrictStudents,
        ];

        for resource in collections {
            assert!(resource.is_collection());
            let envelope = Envelope::for_endpoint(&resource.path());
            assert_eq!(envelope.inner, resource.key(), "{:?}", resource);
        }
    }

    #[test]
    fn test_expanded_options() {
        assert_eq!(expanded(None), QueryOptions::default());
        assert_eq!(expanded(Some("addresses")).expansions.as_deref(), Some("addresses"));
    }
}

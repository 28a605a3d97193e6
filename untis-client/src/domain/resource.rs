//! Reference entities: classes, teachers, subjects, rooms and students.

use std::fmt;

/// Kind of a WebUntis element, with the numeric codes the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    SchoolClass = 1,
    Teacher = 2,
    Subject = 3,
    Room = 4,
    Student = 5,
    Timetable = 6,
}

impl ResourceType {
    /// Numeric code used in URLs and timetable elements.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Look up a kind by its numeric code.
    ///
    /// # Examples
    ///
    /// ```
    /// use untis_client::domain::ResourceType;
    ///
    /// assert_eq!(ResourceType::from_code(2), Some(ResourceType::Teacher));
    /// assert_eq!(ResourceType::from_code(9), None);
    /// ```
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::SchoolClass),
            2 => Some(Self::Teacher),
            3 => Some(Self::Subject),
            4 => Some(Self::Room),
            5 => Some(Self::Student),
            6 => Some(Self::Timetable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchoolClass => "class",
            Self::Teacher => "teacher",
            Self::Subject => "subject",
            Self::Room => "room",
            Self::Student => "student",
            Self::Timetable => "timetable",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every WebUntis element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntisResource {
    pub kind: ResourceType,
    /// Session-stable id, the join key between timetable records and
    /// reference collections.
    pub internal_id: i64,
    /// Short code such as `4BHIF` or `AB`.
    pub unique_name: String,
    pub display_name: String,
    /// Full name, or surname for people.
    pub long_name: String,
    pub alternate_name: Option<String>,
}

impl UntisResource {
    /// A resource that only carries an id and a short code.
    pub fn new(kind: ResourceType, internal_id: i64, unique_name: impl Into<String>) -> Self {
        Self {
            kind,
            internal_id,
            unique_name: unique_name.into(),
            display_name: String::new(),
            long_name: String::new(),
            alternate_name: None,
        }
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = long_name.into();
        self
    }
}

/// Access to the shared fields of a reference entity.
pub trait Resource {
    fn resource(&self) -> &UntisResource;

    fn internal_id(&self) -> i64 {
        self.resource().internal_id
    }

    fn unique_name(&self) -> &str {
        &self.resource().unique_name
    }
}

/// A school class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolClass {
    pub resource: UntisResource,
    pub description: String,
    /// Head teacher. Resolved against the teacher list when the classes are
    /// cached; holds the service's partial record if no teacher matched.
    pub class_teacher: Option<Teacher>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub resource: UntisResource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub resource: UntisResource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub resource: UntisResource,
    pub description: String,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub resource: UntisResource,
    pub fore_name: String,
    /// Id of the student in the school administration system.
    pub extern_key: String,
    /// Internal id of the student's class.
    pub school_class_id: Option<i64>,
}

impl Teacher {
    /// A teacher known only by id and short code.
    pub fn new(internal_id: i64, unique_name: impl Into<String>) -> Self {
        Self {
            resource: UntisResource::new(ResourceType::Teacher, internal_id, unique_name),
        }
    }
}

impl Subject {
    pub fn new(internal_id: i64, unique_name: impl Into<String>) -> Self {
        Self {
            resource: UntisResource::new(ResourceType::Subject, internal_id, unique_name),
        }
    }
}

impl SchoolClass {
    pub fn new(internal_id: i64, unique_name: impl Into<String>) -> Self {
        Self {
            resource: UntisResource::new(ResourceType::SchoolClass, internal_id, unique_name),
            description: String::new(),
            class_teacher: None,
        }
    }
}

impl Room {
    pub fn new(internal_id: i64, unique_name: impl Into<String>) -> Self {
        Self {
            resource: UntisResource::new(ResourceType::Room, internal_id, unique_name),
            description: String::new(),
            capacity: None,
        }
    }
}

macro_rules! impl_resource {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Resource for $ty {
                fn resource(&self) -> &UntisResource {
                    &self.resource
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.resource.unique_name)
                }
            }
        )*
    };
}

impl_resource!(SchoolClass, Teacher, Subject, Room, Student);

impl Resource for UntisResource {
    fn resource(&self) -> &UntisResource {
        self
    }
}

/// Find a resource by internal id.
pub fn find_by_id<T: Resource>(resources: &[T], internal_id: i64) -> Option<&T> {
    resources.iter().find(|r| r.internal_id() == internal_id)
}

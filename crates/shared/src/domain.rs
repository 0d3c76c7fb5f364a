use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(OptionId);
id_newtype!(StreamId);
id_newtype!(DisciplineId);
id_newtype!(ProgramId);
id_newtype!(CourseId);
id_newtype!(SemesterId);
id_newtype!(ProgramCourseId);
id_newtype!(OrganizationId);
id_newtype!(OrganizationProgramId);
id_newtype!(CountryId);
id_newtype!(StateId);
id_newtype!(DistrictId);

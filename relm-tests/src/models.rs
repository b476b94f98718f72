use relm::{
    AsValue, Hooks, Json, Record, Result, Row, RowReader, Struct, TableDef, ViewDef,
};
use std::sync::LazyLock;
use time::OffsetDateTime;
use uuid::Uuid;

/// `people`: auto increment key, an omit-empty nullable email, a list column and an
/// updated column maintained by the hooks.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub tags: Vec<String>,
    pub updated_at: Option<OffsetDateTime>,
}

static PEOPLE: LazyLock<TableDef> = LazyLock::new(|| {
    TableDef::builder("people")
        .primary_key::<i64>("id")
        .column::<String>("name")
        .omit_empty::<Option<String>>("email")
        .column::<Vec<String>>("tags")
        .column::<Option<OffsetDateTime>>("updated_at")
        .updated_column("updated_at")
        .build()
        .expect("Invalid people table")
});

impl Struct for Person {
    fn view() -> &'static ViewDef {
        &PEOPLE
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.name.clone().as_value(),
            self.email.clone().as_value(),
            self.tags.clone().as_value(),
            self.updated_at.as_value(),
        ]
        .into()
    }
    fn scan(&mut self, row: Row) -> Result<()> {
        let mut reader = RowReader::new(row, Self::view())?;
        self.id = reader.read()?;
        self.name = reader.read()?;
        self.email = reader.read()?;
        self.tags = reader.read()?;
        self.updated_at = reader.read()?;
        Ok(())
    }
}

impl Hooks for Person {
    fn before_insert(&mut self) {
        if self.updated_at.is_none() {
            self.updated_at = Some(OffsetDateTime::now_utc());
        }
    }
    fn before_update(&mut self) {
        self.updated_at = Some(OffsetDateTime::now_utc());
    }
}

impl Record for Person {
    fn table() -> &'static TableDef {
        &PEOPLE
    }
}

/// Read only projection of `people`.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct PersonName {
    pub id: i64,
    pub name: String,
}

static PEOPLE_NAMES: LazyLock<ViewDef> = LazyLock::new(|| {
    ViewDef::builder("people")
        .column::<i64>("id")
        .column::<String>("name")
        .build()
        .expect("Invalid people view")
});

impl Struct for PersonName {
    fn view() -> &'static ViewDef {
        &PEOPLE_NAMES
    }
    fn values(&self) -> Row {
        [self.id.as_value(), self.name.clone().as_value()].into()
    }
    fn scan(&mut self, row: Row) -> Result<()> {
        let mut reader = RowReader::new(row, Self::view())?;
        self.id = reader.read()?;
        self.name = reader.read()?;
        Ok(())
    }
}

/// `memberships`: composite key, no generated values.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Membership {
    pub team_id: i64,
    pub person_id: i64,
    pub role: String,
}

static MEMBERSHIPS: LazyLock<TableDef> = LazyLock::new(|| {
    TableDef::builder("memberships")
        .primary_key::<i64>("team_id")
        .primary_key::<i64>("person_id")
        .column::<String>("role")
        .build()
        .expect("Invalid memberships table")
});

impl Struct for Membership {
    fn view() -> &'static ViewDef {
        &MEMBERSHIPS
    }
    fn values(&self) -> Row {
        [
            self.team_id.as_value(),
            self.person_id.as_value(),
            self.role.clone().as_value(),
        ]
        .into()
    }
    fn scan(&mut self, row: Row) -> Result<()> {
        let mut reader = RowReader::new(row, Self::view())?;
        self.team_id = reader.read()?;
        self.person_id = reader.read()?;
        self.role = reader.read()?;
        Ok(())
    }
}

impl Hooks for Membership {}

impl Record for Membership {
    fn table() -> &'static TableDef {
        &MEMBERSHIPS
    }
}

/// `docs.documents`: client generated uuid key, a json body and a version counter.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub body: Json,
    pub version: i32,
    pub published_at: Option<OffsetDateTime>,
}

static DOCUMENTS: LazyLock<TableDef> = LazyLock::new(|| {
    TableDef::builder("documents")
        .schema("docs")
        .primary_key::<Uuid>("id")
        .column::<String>("title")
        .column::<Json>("body")
        .column::<i32>("version")
        .column::<Option<OffsetDateTime>>("published_at")
        .build()
        .expect("Invalid documents table")
});

impl Struct for Document {
    fn view() -> &'static ViewDef {
        &DOCUMENTS
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.title.clone().as_value(),
            self.body.clone().as_value(),
            self.version.as_value(),
            self.published_at.as_value(),
        ]
        .into()
    }
    fn scan(&mut self, row: Row) -> Result<()> {
        let mut reader = RowReader::new(row, Self::view())?;
        self.id = reader.read()?;
        self.title = reader.read()?;
        self.body = reader.read()?;
        self.version = reader.read()?;
        self.published_at = reader.read()?;
        Ok(())
    }
}

impl Hooks for Document {
    fn before_insert(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
    }
    fn before_update(&mut self) {
        self.version += 1;
    }
}

impl Record for Document {
    fn table() -> &'static TableDef {
        &DOCUMENTS
    }
}

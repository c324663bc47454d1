//! Report query composition and the fixed analytical reports

pub mod aggregates;
pub mod builder;
pub mod predicate;

pub use aggregates::{
    group_sales, quarter_discounts, region_quantities, weekday_volumes, GroupSales,
    QuarterDiscount, RegionQuantity, WeekdayVolume,
};
pub use builder::{form_report, grouped_form_report, ReportRow};
pub use predicate::{build_predicate, Aliases, Predicate, PredicateSet, ReportFilter};

// Reusable view pieces shared by the pages and the page shell

pub mod card;
pub mod footer;
pub mod header;
pub mod loader;
pub mod pagination;
pub mod pill;
pub mod search;
pub mod table;

pub use card::{hysa_card, HysaCard};
pub use footer::render_footer;
pub use header::{render_header, update_active_nav};
pub use loader::render_skeleton_cards;
pub use pagination::{create_pagination, pagination_range, PageItem};
pub use pill::{eligibility_pill, filter_pill};
pub use search::{EligibilityFilter, Filters, SearchBar};
pub use table::{create_mobile_cards, create_table, Sort, SortColumn, SortDirection};
